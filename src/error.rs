use thiserror::Error;

use crate::lifecycle::LifecycleError;

pub type Result<T> = std::result::Result<T, Error>;

/// Result type for the DI container.
pub type DiResult<T> = std::result::Result<T, DiError>;

/// Startup and infrastructure failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Di(#[from] DiError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Route registration failed for {method} {path}: {message}")]
    RouteRegistration {
        method: String,
        path: String,
        message: String,
    },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Failures raised while resolving providers.
#[derive(Debug, Error)]
pub enum DiError {
    #[error("Provider with token \"{token}\" not found in the scope of module \"{module}\"")]
    ProviderNotFound { token: String, module: String },

    #[error("Failed to instantiate \"{token}\" requested from module \"{module}\": {source}")]
    Instantiation {
        module: String,
        token: String,
        #[source]
        source: Box<DiError>,
    },

    #[error("Cannot resolve dependency of \"{class}\" at index {index}")]
    UnresolvableParameter { class: String, index: usize },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Missing dependency at position {index} while constructing \"{class}\"")]
    MissingArgument { class: String, index: usize },

    #[error("{message}")]
    Construction { message: String },
}

impl DiError {
    /// Wraps an error raised by user construction code.
    pub fn construction(message: impl std::fmt::Display) -> Self {
        Self::Construction {
            message: message.to_string(),
        }
    }

    pub(crate) fn downcast_failed<T: ?Sized>() -> Self {
        Self::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }
}

/// Failures raised while compiling the module graph.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Module \"{module}\" is missing its module metadata")]
    MissingModuleMetadata { module: String },

    #[error("Module \"{module}\" imports \"{import}\", which is not a compiled module")]
    InvalidImport { module: String, import: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiation_error_names_module_and_token() {
        let err = DiError::Instantiation {
            module: "UsersModule".into(),
            token: "UsersService".into(),
            source: Box::new(DiError::ProviderNotFound {
                token: "DB".into(),
                module: "UsersModule".into(),
            }),
        };
        let message = err.to_string();
        assert!(message.contains("UsersModule"));
        assert!(message.contains("UsersService"));
        assert!(message.contains("DB"));
    }

    #[test]
    fn di_error_converts_into_top_level_error() {
        let err: Error = DiError::construction("boom").into();
        assert!(matches!(err, Error::Di(DiError::Construction { .. })));
        assert_eq!(err.to_string(), "boom");
    }
}
