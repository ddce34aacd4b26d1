//! Error types for the Sparrow Server
//!
//! This module contains the error types used throughout the server.

use sparrow_core::CoreError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// The request conflicts with the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Definition file could not be parsed
    #[error("Definition parsing error: {0}")]
    DefinitionParsingError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DefinitionNotFound(key) => {
                ServerError::NotFound(format!("Process definition {}", key))
            }
            CoreError::InstanceNotFound(id) => ServerError::NotFound(format!("Process instance {}", id)),
            CoreError::TaskNotFound(id) => ServerError::NotFound(format!("Task {}", id)),
            CoreError::TaskAlreadyCompleted(id) => {
                ServerError::Conflict(format!("Task already completed: {}", id))
            }
            CoreError::ValidationError(msg) => ServerError::ValidationError(msg),
            CoreError::SerializationError(msg) => ServerError::DefinitionParsingError(msg),
            CoreError::StateStoreError(msg) => ServerError::StateStoreError(msg),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::InternalError(format!("IO error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        assert!(matches!(
            ServerError::from(CoreError::TaskNotFound("t1".into())),
            ServerError::NotFound(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::TaskAlreadyCompleted("t1".into())),
            ServerError::Conflict(_)
        ));
        assert!(matches!(
            ServerError::from(CoreError::ValidationError("bad".into())),
            ServerError::ValidationError(msg) if msg == "bad"
        ));
        assert_eq!(
            ServerError::from(CoreError::DefinitionNotFound("leaveProcess".into())).to_string(),
            "Process definition leaveProcess not found"
        );
    }
}
