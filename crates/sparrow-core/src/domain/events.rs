use crate::domain::process_definition::ProcessDefinitionId;
use crate::domain::process_instance::ProcessInstanceId;
use crate::domain::task::TaskId;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the process instance ID this event is associated with
    fn instance_id(&self) -> &ProcessInstanceId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! domain_event {
    ($ty:ident, $name:literal) => {
        impl DomainEvent for $ty {
            fn event_type(&self) -> &'static str {
                $name
            }

            fn instance_id(&self) -> &ProcessInstanceId {
                &self.instance_id
            }

            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        }
    };
}

/// Event: Process instance started
#[derive(Debug)]
pub struct InstanceStarted {
    /// The unique identifier of the process instance
    pub instance_id: ProcessInstanceId,

    /// The definition the instance runs
    pub definition_id: ProcessDefinitionId,

    /// Principal that started the instance
    pub started_by: String,

    /// The timestamp when the instance was started
    pub timestamp: DateTime<Utc>,
}

domain_event!(InstanceStarted, "instance.started");

/// Event: Instance moved from one step to another
#[derive(Debug)]
pub struct StepAdvanced {
    /// The unique identifier of the process instance
    pub instance_id: ProcessInstanceId,
    /// Step index the instance left
    pub from_step: usize,
    /// Step index the instance entered
    pub to_step: usize,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

domain_event!(StepAdvanced, "instance.step_advanced");

/// Event: Process instance completed
#[derive(Debug)]
pub struct InstanceCompleted {
    /// The unique identifier of the process instance
    pub instance_id: ProcessInstanceId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

domain_event!(InstanceCompleted, "instance.completed");

/// Event: Task created for a step
#[derive(Debug)]
pub struct TaskCreated {
    /// The unique identifier of the process instance
    pub instance_id: ProcessInstanceId,
    /// The new task
    pub task_id: TaskId,
    /// Step index the task belongs to
    pub step_index: usize,
    /// Resolved assignee, if any
    pub assignee: Option<String>,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

domain_event!(TaskCreated, "task.created");

/// Event: Task reassigned
#[derive(Debug)]
pub struct TaskAssigned {
    /// The unique identifier of the process instance
    pub instance_id: ProcessInstanceId,
    /// The reassigned task
    pub task_id: TaskId,
    /// Previous assignee
    pub previous: Option<String>,
    /// New assignee
    pub assignee: String,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

domain_event!(TaskAssigned, "task.assigned");

/// Event: Task completed
#[derive(Debug)]
pub struct TaskCompleted {
    /// The unique identifier of the process instance
    pub instance_id: ProcessInstanceId,
    /// The completed task
    pub task_id: TaskId,
    /// Principal that completed the task
    pub completed_by: String,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

domain_event!(TaskCompleted, "task.completed");
