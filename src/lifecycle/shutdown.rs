//! Graceful Shutdown Handler
//!
//! Handles OS signals and runs the shutdown hooks.

use super::{LifecycleManager, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

/// Handles graceful shutdown of the application
///
/// ShutdownHandler listens for OS signals (SIGTERM, SIGINT) and runs the
/// `OnApplicationShutdown` hooks with the name of the received signal.
///
/// # Example
///
/// ```rust,ignore
/// let shutdown_handler = app.shutdown_handler();
///
/// tokio::spawn(async move {
///     shutdown_handler.wait_for_shutdown().await;
///     std::process::exit(0);
/// });
/// ```
pub struct ShutdownHandler {
    lifecycle_manager: Arc<LifecycleManager>,
    timeout: Option<Duration>,
}

impl ShutdownHandler {
    pub fn new(lifecycle_manager: Arc<LifecycleManager>, timeout: Option<Duration>) -> Self {
        Self {
            lifecycle_manager,
            timeout,
        }
    }

    /// Wait for a shutdown signal, then run the shutdown hooks
    pub async fn wait_for_shutdown(&self) {
        let signal = shutdown_signal().await;
        if let Err(e) = self.shutdown(Some(signal)).await {
            tracing::error!("Error during application shutdown: {}", e);
        }
    }

    /// Run the shutdown hooks in reverse resolution order
    ///
    /// Every hook runs; failures are reported together once all have run.
    pub async fn shutdown(&self, signal: Option<&str>) -> Result<()> {
        tracing::info!("Starting graceful shutdown...");

        match self.timeout {
            Some(timeout) => {
                self.lifecycle_manager
                    .call_application_shutdown_with_timeout(signal, timeout)
                    .await?
            }
            None => self.lifecycle_manager.call_application_shutdown(signal).await?,
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}

/// Completes when a shutdown signal is received, returning its name
///
/// # Example
///
/// ```rust,ignore
/// use keel::lifecycle::shutdown_signal;
///
/// tokio::select! {
///     signal = shutdown_signal() => {
///         tracing::info!("{signal} received");
///     }
///     _ = server.serve() => {}
/// }
/// ```
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
            "SIGINT"
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
            "SIGTERM"
        },
    }
}
