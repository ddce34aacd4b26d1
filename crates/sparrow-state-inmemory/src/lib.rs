//! In-memory state store for the Sparrow workflow engine
//!
//! This crate provides in-memory implementations of the repository
//! interfaces defined in sparrow-core. Nothing survives a restart, which
//! suits development, tests and single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod repositories;
pub use repositories::{
    InMemoryHistoryRepository, InMemoryProcessDefinitionRepository,
    InMemoryProcessInstanceRepository, InMemoryTaskRepository,
};

use sparrow_core::{
    domain::repository::{
        HistoryRepository, ProcessDefinitionRepository, ProcessInstanceRepository, TaskRepository,
    },
    DomainEventHandler, HistoryRecord, LocalWorkflowEngine, ProcessDefinition, ProcessInstance,
    Task,
};

/// Provider for in-memory state store repositories
#[derive(Default)]
pub struct InMemoryStateStoreProvider {
    definitions: Arc<RwLock<HashMap<String, ProcessDefinition>>>,
    instances: Arc<RwLock<HashMap<String, ProcessInstance>>>,
    tasks: Arc<RwLock<HashMap<String, Task>>>,
    history: Arc<RwLock<HashMap<String, HistoryRecord>>>,
}

impl InMemoryStateStoreProvider {
    /// Create a new in-memory state store provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create repositories sharing this provider's storage
    pub fn create_repositories(
        &self,
    ) -> (
        Arc<dyn ProcessDefinitionRepository>,
        Arc<dyn ProcessInstanceRepository>,
        Arc<dyn TaskRepository>,
        Arc<dyn HistoryRepository>,
    ) {
        (
            Arc::new(InMemoryProcessDefinitionRepository::new(self.definitions.clone())),
            Arc::new(InMemoryProcessInstanceRepository::new(self.instances.clone())),
            Arc::new(InMemoryTaskRepository::new(self.tasks.clone())),
            Arc::new(InMemoryHistoryRepository::new(self.history.clone())),
        )
    }

    /// Build an engine over this provider's storage
    pub fn create_engine(&self, event_handler: Arc<dyn DomainEventHandler>) -> LocalWorkflowEngine {
        let (definitions, instances, tasks, history) = self.create_repositories();
        LocalWorkflowEngine::new(definitions, instances, tasks, history, event_handler)
    }
}
