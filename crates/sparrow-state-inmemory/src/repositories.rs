use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use sparrow_core::{
    domain::repository::{
        HistoryRepository, ProcessDefinitionRepository, ProcessInstanceRepository, TaskRepository,
    },
    CoreError, DefinitionKey, HistoryQuery, HistoryRecord, InstanceStatus, ProcessDefinition,
    ProcessDefinitionId, ProcessInstance, ProcessInstanceId, Task, TaskId,
};

/// In-memory implementation of the ProcessDefinitionRepository
pub struct InMemoryProcessDefinitionRepository {
    definitions: Arc<RwLock<HashMap<String, ProcessDefinition>>>,
}

impl InMemoryProcessDefinitionRepository {
    /// Create a new in-memory process definition repository
    pub fn new(definitions: Arc<RwLock<HashMap<String, ProcessDefinition>>>) -> Self {
        Self { definitions }
    }
}

#[async_trait]
impl ProcessDefinitionRepository for InMemoryProcessDefinitionRepository {
    async fn find_by_id(
        &self,
        id: &ProcessDefinitionId,
    ) -> Result<Option<ProcessDefinition>, CoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions.get(&id.0).cloned())
    }

    async fn find_latest(&self, key: &DefinitionKey) -> Result<Option<ProcessDefinition>, CoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions
            .values()
            .filter(|d| &d.key == key)
            .max_by_key(|d| d.version)
            .cloned())
    }

    async fn save(&self, definition: &ProcessDefinition) -> Result<(), CoreError> {
        let mut definitions = self.definitions.write().await;
        if definitions.contains_key(&definition.id.0) {
            return Err(CoreError::StateStoreError(format!(
                "Process definition already published: {}",
                definition.id
            )));
        }
        definitions.insert(definition.id.0.clone(), definition.clone());
        debug!("Saved process definition: {}", definition.id);
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<ProcessDefinition>, CoreError> {
        let definitions = self.definitions.read().await;
        Ok(definitions.values().cloned().collect())
    }
}

/// In-memory implementation of the ProcessInstanceRepository
pub struct InMemoryProcessInstanceRepository {
    instances: Arc<RwLock<HashMap<String, ProcessInstance>>>,
}

impl InMemoryProcessInstanceRepository {
    /// Create a new in-memory process instance repository
    pub fn new(instances: Arc<RwLock<HashMap<String, ProcessInstance>>>) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl ProcessInstanceRepository for InMemoryProcessInstanceRepository {
    async fn find_by_id(&self, id: &ProcessInstanceId) -> Result<Option<ProcessInstance>, CoreError> {
        let instances = self.instances.read().await;
        Ok(instances.get(&id.0).cloned())
    }

    async fn save(&self, instance: &ProcessInstance) -> Result<(), CoreError> {
        let mut instances = self.instances.write().await;
        instances.insert(instance.id.0.clone(), instance.clone());
        Ok(())
    }

    async fn list_instances(
        &self,
        definition_key: Option<&DefinitionKey>,
        status: Option<&InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>, CoreError> {
        let instances = self.instances.read().await;

        let result = instances
            .values()
            .filter(|instance| definition_key.map_or(true, |key| &instance.definition_key == key))
            .filter(|instance| status.map_or(true, |status| &instance.status == status))
            .cloned()
            .collect();

        Ok(result)
    }
}

/// In-memory implementation of the TaskRepository
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskRepository {
    /// Create a new in-memory task repository
    pub fn new(tasks: Arc<RwLock<HashMap<String, Task>>>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, CoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks.get(&id.0).cloned())
    }

    async fn save(&self, task: &Task) -> Result<(), CoreError> {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id.0.clone(), task.clone());
        Ok(())
    }

    async fn find_open(&self, assignee: Option<&str>) -> Result<Vec<Task>, CoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|task| task.is_open())
            .filter(|task| assignee.map_or(true, |who| task.assignee.as_deref() == Some(who)))
            .cloned()
            .collect())
    }

    async fn find_open_for_instance(&self, instance_id: &ProcessInstanceId) -> Result<Vec<Task>, CoreError> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|task| task.is_open() && &task.instance_id == instance_id)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of the HistoryRepository
pub struct InMemoryHistoryRepository {
    records: Arc<RwLock<HashMap<String, HistoryRecord>>>,
}

impl InMemoryHistoryRepository {
    /// Create a new in-memory history repository
    pub fn new(records: Arc<RwLock<HashMap<String, HistoryRecord>>>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn append(&self, record: &HistoryRecord) -> Result<(), CoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.instance_id.0) {
            return Err(CoreError::StateStoreError(format!(
                "History already recorded for instance: {}",
                record.instance_id
            )));
        }
        records.insert(record.instance_id.0.clone(), record.clone());
        Ok(())
    }

    async fn find_by_instance(&self, instance_id: &ProcessInstanceId) -> Result<Option<HistoryRecord>, CoreError> {
        let records = self.records.read().await;
        Ok(records.get(&instance_id.0).cloned())
    }

    async fn query(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, CoreError> {
        let records = self.records.read().await;
        Ok(records.values().filter(|r| query.matches(r)).cloned().collect())
    }
}
