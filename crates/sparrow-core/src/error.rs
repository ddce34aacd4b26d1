use thiserror::Error;

/// Core error type for the Sparrow engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No process definition is published under the given key or id
    #[error("Process definition not found: {0}")]
    DefinitionNotFound(String),

    /// Process instance not found
    #[error("Process instance not found: {0}")]
    InstanceNotFound(String),

    /// Task not found
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// The task was already completed and cannot be completed or reassigned again
    #[error("Task already completed: {0}")]
    TaskAlreadyCompleted(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (CoreError::DefinitionNotFound("leaveProcess".to_string()), "Process definition not found: leaveProcess"),
            (CoreError::InstanceNotFound("i-1".to_string()), "Process instance not found: i-1"),
            (CoreError::TaskNotFound("t-1".to_string()), "Task not found: t-1"),
            (CoreError::TaskAlreadyCompleted("t-1".to_string()), "Task already completed: t-1"),
            (CoreError::ValidationError("taskId is blank".to_string()), "Validation error: taskId is blank"),
            (CoreError::StateStoreError("poisoned".to_string()), "State store error: poisoned"),
            (CoreError::SerializationError("bad yaml".to_string()), "Serialization error: bad yaml"),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<Vec<String>>("key: [unclosed").unwrap_err();
        let error: CoreError = yaml_error.into();

        match error {
            CoreError::SerializationError(_) => {}
            other => panic!("Expected SerializationError variant, got {:?}", other),
        }
    }
}
