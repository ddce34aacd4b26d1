use crate::{
    domain::process_definition::{ProcessDefinitionId, StepDefinition},
    domain::process_instance::{ProcessInstance, ProcessInstanceId},
    CoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Value object: Task ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for its assignee
    Open,
    /// Done; kept for audit
    Completed,
}

/// A unit of human work bound to one step of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Owning instance
    pub instance_id: ProcessInstanceId,

    /// Definition version of the owning instance
    pub definition_id: ProcessDefinitionId,

    /// Step index within the definition
    pub step_index: usize,

    /// Step ID within the definition
    pub step_id: String,

    /// Task name, copied from the step
    pub name: String,

    /// Principal expected to complete the task
    pub assignee: Option<String>,

    /// Creation timestamp
    pub create_time: DateTime<Utc>,

    /// Current status
    pub status: TaskStatus,

    /// Set when the task is completed
    pub completed_at: Option<DateTime<Utc>>,

    /// Principal that completed the task
    pub completed_by: Option<String>,
}

impl Task {
    /// Create an open task for the instance's current step
    pub fn for_step(instance: &ProcessInstance, step: &StepDefinition, assignee: Option<String>) -> Self {
        Self {
            id: TaskId(Uuid::new_v4().to_string()),
            instance_id: instance.id.clone(),
            definition_id: instance.definition_id.clone(),
            step_index: instance.current_step,
            step_id: step.id.clone(),
            name: step.name.clone(),
            assignee,
            create_time: Utc::now(),
            status: TaskStatus::Open,
            completed_at: None,
            completed_by: None,
        }
    }

    /// Whether the task is still open
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Open
    }

    /// Executions are single-path, so the execution is the instance itself
    #[inline]
    pub fn execution_id(&self) -> &str {
        &self.instance_id.0
    }

    fn ensure_open(&self) -> Result<(), CoreError> {
        if !self.is_open() {
            return Err(CoreError::TaskAlreadyCompleted(self.id.0.clone()));
        }
        Ok(())
    }

    /// Hand the task to another principal; returns the previous assignee
    pub fn reassign(&mut self, principal: &str) -> Result<Option<String>, CoreError> {
        self.ensure_open()?;
        if principal.trim().is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Cannot assign task {} to a blank principal",
                self.id
            )));
        }
        Ok(self.assignee.replace(principal.to_string()))
    }

    /// Close the task
    pub fn complete(&mut self, actor: &str) -> Result<(), CoreError> {
        self.ensure_open()?;
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.completed_by = Some(actor.to_string());
        Ok(())
    }
}
