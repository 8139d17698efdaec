//! Lifecycle-specific error types

use thiserror::Error;

/// Errors raised by lifecycle hooks and the phases that run them
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A provider failed to initialize
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// One or more shutdown hooks failed; every hook still ran
    #[error("Shutdown failed for {}", .failures.join(", "))]
    ShutdownFailed { failures: Vec<String> },

    /// A phase did not finish in time
    #[error("Timeout during {phase}: {message}")]
    Timeout { phase: String, message: String },

    /// A hook returned an error
    #[error("{phase} hook failed for {service}: {message}")]
    HookFailed {
        phase: &'static str,
        service: String,
        message: String,
    },
}

impl LifecycleError {
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn timeout(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Timeout {
            phase: phase.into(),
            message: message.into(),
        }
    }

    pub fn hook_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            phase: "Lifecycle",
            service: service.into(),
            message: message.into(),
        }
    }

    pub(crate) fn in_phase(self, phase: &'static str, service: &str) -> Self {
        match self {
            Self::HookFailed { phase: _, service, message } => Self::HookFailed {
                phase,
                service,
                message,
            },
            other => Self::HookFailed {
                phase,
                service: service.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
