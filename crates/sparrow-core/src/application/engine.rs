use crate::{
    application::definition_registry::ProcessDefinitionService,
    application::event_handler::DomainEventHandler,
    application::history_log::HistoryService,
    application::instance_store::ProcessInstanceService,
    application::task_dispatcher::{CompletionOutcome, TaskService},
    domain::history::{HistoryQuery, HistoryRecord},
    domain::process_definition::ProcessDefinition,
    domain::process_instance::{ProcessInstance, ProcessInstanceId},
    domain::repository::{
        HistoryRepository, ProcessDefinitionRepository, ProcessInstanceRepository, TaskRepository,
    },
    domain::task::{Task, TaskId},
    types::Variables,
    CoreError,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Workflow engine as seen by callers
///
/// Every principal is passed explicitly; the engine holds no ambient
/// identity.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Publish a definition as the next version of its key
    async fn publish_definition(
        &self,
        definition: ProcessDefinition,
    ) -> Result<ProcessDefinition, CoreError>;

    /// All published definitions
    async fn list_definitions(&self) -> Result<Vec<ProcessDefinition>, CoreError>;

    /// Start an instance of the latest version of `key`
    async fn start_process(
        &self,
        key: &str,
        variables: Variables,
        started_by: &str,
    ) -> Result<ProcessInstanceId, CoreError>;

    /// Get an instance by ID
    async fn get_instance(&self, id: &ProcessInstanceId) -> Result<ProcessInstance, CoreError>;

    /// Move an instance past its current step on behalf of `actor`
    ///
    /// Task state follows: the step's open task is closed and the next one
    /// is opened, as if the task had been completed.
    async fn advance_instance(
        &self,
        id: &ProcessInstanceId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<ProcessInstance, CoreError>;

    /// Open tasks, optionally only those of `assignee`
    async fn list_tasks(&self, assignee: Option<&str>) -> Result<Vec<Task>, CoreError>;

    /// Get a task by ID
    async fn get_task(&self, id: &TaskId) -> Result<Task, CoreError>;

    /// Reassign an open task
    async fn assign_task(&self, id: &TaskId, principal: &str) -> Result<Task, CoreError>;

    /// Complete an open task
    async fn complete_task(
        &self,
        id: &TaskId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<CompletionOutcome, CoreError>;

    /// Query the history log
    async fn query_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, CoreError>;
}

/// In-process engine built from the application services
#[derive(Clone)]
pub struct LocalWorkflowEngine {
    definitions: Arc<ProcessDefinitionService>,
    instances: Arc<ProcessInstanceService>,
    tasks: Arc<TaskService>,
    history: Arc<HistoryService>,
}

impl LocalWorkflowEngine {
    /// Wire the services over the given repositories
    pub fn new(
        definition_repo: Arc<dyn ProcessDefinitionRepository>,
        instance_repo: Arc<dyn ProcessInstanceRepository>,
        task_repo: Arc<dyn TaskRepository>,
        history_repo: Arc<dyn HistoryRepository>,
        event_handler: Arc<dyn DomainEventHandler>,
    ) -> Self {
        let definitions = Arc::new(ProcessDefinitionService::new(definition_repo));
        let instances = Arc::new(ProcessInstanceService::new(
            instance_repo.clone(),
            event_handler.clone(),
        ));
        let history = Arc::new(HistoryService::new(history_repo, instance_repo));
        let tasks = Arc::new(TaskService::new(
            definitions.clone(),
            instances.clone(),
            history.clone(),
            task_repo,
            event_handler,
        ));

        Self {
            definitions,
            instances,
            tasks,
            history,
        }
    }
}

#[async_trait]
impl WorkflowEngine for LocalWorkflowEngine {
    async fn publish_definition(
        &self,
        definition: ProcessDefinition,
    ) -> Result<ProcessDefinition, CoreError> {
        self.definitions.publish(definition).await
    }

    async fn list_definitions(&self) -> Result<Vec<ProcessDefinition>, CoreError> {
        self.definitions.list().await
    }

    async fn start_process(
        &self,
        key: &str,
        variables: Variables,
        started_by: &str,
    ) -> Result<ProcessInstanceId, CoreError> {
        let (instance, _task) = self.tasks.start(key, variables, started_by).await?;
        Ok(instance.id)
    }

    async fn get_instance(&self, id: &ProcessInstanceId) -> Result<ProcessInstance, CoreError> {
        self.instances.get(id).await
    }

    async fn advance_instance(
        &self,
        id: &ProcessInstanceId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<ProcessInstance, CoreError> {
        let (instance, _outcome) = self.tasks.advance(id, variables, actor).await?;
        Ok(instance)
    }

    async fn list_tasks(&self, assignee: Option<&str>) -> Result<Vec<Task>, CoreError> {
        self.tasks.list_tasks(assignee).await
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, CoreError> {
        self.tasks.get(id).await
    }

    async fn assign_task(&self, id: &TaskId, principal: &str) -> Result<Task, CoreError> {
        self.tasks.assign(id, principal).await
    }

    async fn complete_task(
        &self,
        id: &TaskId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<CompletionOutcome, CoreError> {
        self.tasks.complete(id, variables, actor).await
    }

    async fn query_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryRecord>, CoreError> {
        self.history.query(query).await
    }
}
