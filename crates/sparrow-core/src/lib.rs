//!
//! Sparrow Core - Workflow engine core
//!
//! This crate defines the domain models, repository interfaces and
//! application services of the Sparrow workflow engine: versioned process
//! definitions, running instances, human tasks and the history log.
//! Storage lives behind the repository traits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - process models, entities and rules
pub mod domain;

/// Application services - engine logic over the repositories
pub mod application;

/// Process variables
pub mod types;

/// Error types
pub mod error;

pub use error::CoreError;
pub use types::{variables, VariableKind, VariableValue, Variables};

// Engine facade
pub use application::engine::{LocalWorkflowEngine, WorkflowEngine};
pub use application::event_handler::{DomainEventHandler, TracingEventHandler};
pub use application::instance_store::{AdvanceOutcome, InstanceLocks};
pub use application::task_dispatcher::CompletionOutcome;

// Re-export main API types for easy use
pub use domain::history::{HistoryQuery, HistoryRecord};
pub use domain::process_definition::{
    AssigneeRule, BranchCase, DefinitionKey, ProcessDefinition, ProcessDefinitionId,
    StepDefinition, Target, TransitionRule, VariableSpec, LEAVE_PROCESS_KEY,
};
pub use domain::process_instance::{InstanceStatus, ProcessInstance, ProcessInstanceId};
pub use domain::repository::{
    HistoryRepository, ProcessDefinitionRepository, ProcessInstanceRepository, TaskRepository,
};
pub use domain::task::{Task, TaskId, TaskStatus};
