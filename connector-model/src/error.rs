// Connector error types
//
// Launch failures are always surfaced as a single LaunchFailed that keeps the
// triggering validation or transport error as its source

use crate::parameters::ParamType;
use thiserror::Error;

pub type ConnectionResult<T> = Result<T, ConnectionError>;
pub type LaunchResult<T> = Result<T, LaunchFailed>;
pub type ContainerResult<T> = Result<T, ContainerError>;

/// A launch argument that does not satisfy its descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required parameter '{0}'")]
    Missing(String),

    #[error("Parameter '{name}' expects {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        found: ParamType,
    },

    #[error("Unknown parameter '{0}'")]
    Unknown(String),
}

/// Failure reported by a ConnectionManager
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),

    #[error("Connection to {0} timed out")]
    Timeout(String),

    // Transport-provided message, shown verbatim
    #[error("{0}")]
    Transport(String),

    #[error("Connect task aborted: {0}")]
    Aborted(String),
}

/// What made a launch fail
#[derive(Debug, Error)]
pub enum LaunchCause {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// The one error a launch resolves to
#[derive(Debug, Error)]
#[error("Launch failed for {args}")]
pub struct LaunchFailed {
    /// Serialized launch arguments as the caller supplied them
    pub args: String,
    #[source]
    pub cause: LaunchCause,
}

impl LaunchFailed {
    pub fn new(args: String, cause: impl Into<LaunchCause>) -> Self {
        Self {
            args,
            cause: cause.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.cause, LaunchCause::Validation(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("Connector {connector} is not a member of {container}")]
    NotMember { connector: String, container: String },

    #[error("Connector {0} has no container")]
    Detached(String),

    #[error("No connector named '{0}'")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_launch_failed_keeps_source() {
        let err = LaunchFailed::new(
            r#"{"Host":"x"}"#.to_string(),
            ConnectionError::Transport("refused".to_string()),
        );

        assert_eq!(err.to_string(), r#"Launch failed for {"Host":"x"}"#);
        let source = err.source().expect("source attached");
        assert_eq!(source.to_string(), "refused");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_message() {
        let err = ValidationError::TypeMismatch {
            name: "Port".to_string(),
            expected: ParamType::String,
            found: ParamType::Int,
        };
        assert_eq!(err.to_string(), "Parameter 'Port' expects string, got integer");
    }
}
