//! Repository traits for the Sparrow core
//!
//! This module defines the persistence seams used by the application
//! services. External crates implement these traits to provide storage;
//! `sparrow-state-inmemory` ships the in-memory implementation.

use async_trait::async_trait;

use super::history::{HistoryQuery, HistoryRecord};
use super::process_definition::{DefinitionKey, ProcessDefinition, ProcessDefinitionId};
use super::process_instance::{InstanceStatus, ProcessInstance, ProcessInstanceId};
use super::task::{Task, TaskId};
use crate::CoreError;

/// Repository for published process definitions
#[async_trait]
pub trait ProcessDefinitionRepository: Send + Sync {
    /// Find a definition by its versioned ID
    async fn find_by_id(
        &self,
        id: &ProcessDefinitionId,
    ) -> Result<Option<ProcessDefinition>, CoreError>;

    /// Find the highest version published under `key`
    async fn find_latest(&self, key: &DefinitionKey) -> Result<Option<ProcessDefinition>, CoreError>;

    /// Store a definition; an ID that is already stored is rejected
    async fn save(&self, definition: &ProcessDefinition) -> Result<(), CoreError>;

    /// Get all published definitions
    async fn find_all(&self) -> Result<Vec<ProcessDefinition>, CoreError>;
}

/// Repository for process instances
#[async_trait]
pub trait ProcessInstanceRepository: Send + Sync {
    /// Find an instance by ID
    async fn find_by_id(&self, id: &ProcessInstanceId) -> Result<Option<ProcessInstance>, CoreError>;

    /// Insert or replace an instance
    async fn save(&self, instance: &ProcessInstance) -> Result<(), CoreError>;

    /// List instances with optional filters
    async fn list_instances(
        &self,
        definition_key: Option<&DefinitionKey>,
        status: Option<&InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>, CoreError>;
}

/// Repository for tasks, open and archived
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Find a task by ID
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, CoreError>;

    /// Insert or replace a task
    async fn save(&self, task: &Task) -> Result<(), CoreError>;

    /// All open tasks, optionally only those assigned to `assignee`
    async fn find_open(&self, assignee: Option<&str>) -> Result<Vec<Task>, CoreError>;

    /// Open tasks of one instance
    async fn find_open_for_instance(&self, instance_id: &ProcessInstanceId) -> Result<Vec<Task>, CoreError>;
}

/// Append-only store of history records
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append a record; a second record for the same instance is rejected
    async fn append(&self, record: &HistoryRecord) -> Result<(), CoreError>;

    /// Find the record of one instance
    async fn find_by_instance(&self, instance_id: &ProcessInstanceId) -> Result<Option<HistoryRecord>, CoreError>;

    /// Records matching `query`, in no particular order
    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, CoreError>;
}
