use crate::{
    application::definition_registry::ProcessDefinitionService,
    application::event_handler::{publish_events, DomainEventHandler},
    application::history_log::HistoryService,
    application::instance_store::{AdvanceOutcome, ProcessInstanceService},
    domain::events::{DomainEvent, TaskAssigned, TaskCompleted, TaskCreated},
    domain::process_definition::ProcessDefinition,
    domain::process_instance::{InstanceStatus, ProcessInstance, ProcessInstanceId},
    domain::repository::TaskRepository,
    domain::task::{Task, TaskId},
    types::Variables,
    CoreError,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Principal recorded when a task is completed anonymously and unassigned
const ANONYMOUS: &str = "anonymous";

/// Result of completing a task
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    /// The task, now closed
    pub task: Task,

    /// Owning instance
    pub instance_id: ProcessInstanceId,

    /// Instance status after the completion
    pub instance_status: InstanceStatus,

    /// Task created for the next step, if the instance is still running
    pub next_task: Option<Task>,
}

/// Stored effect of one step transition
struct Transition {
    instance: ProcessInstance,
    outcome: AdvanceOutcome,
    closed: Vec<Task>,
    next_task: Option<Task>,
}

/// Task dispatcher
///
/// Materializes the human task of an instance's current step and routes
/// completions back into the instance store.
pub struct TaskService {
    definitions: Arc<ProcessDefinitionService>,
    instances: Arc<ProcessInstanceService>,
    history: Arc<HistoryService>,
    task_repo: Arc<dyn TaskRepository>,
    event_handler: Arc<dyn DomainEventHandler>,
}

impl TaskService {
    /// Create a new task service
    pub fn new(
        definitions: Arc<ProcessDefinitionService>,
        instances: Arc<ProcessInstanceService>,
        history: Arc<HistoryService>,
        task_repo: Arc<dyn TaskRepository>,
        event_handler: Arc<dyn DomainEventHandler>,
    ) -> Self {
        Self {
            definitions,
            instances,
            history,
            task_repo,
            event_handler,
        }
    }

    /// Start an instance of `key` and create the task of its first step
    pub async fn start(
        &self,
        key: &str,
        variables: Variables,
        started_by: &str,
    ) -> Result<(ProcessInstance, Task), CoreError> {
        let definition = self.definitions.latest(key).await?;

        // Resolve the first assignee before anything is stored
        let first_step = definition.step(0).ok_or_else(|| {
            CoreError::ValidationError(format!("Process {} has no steps", definition.id))
        })?;
        let assignee = first_step.resolve_assignee(&variables, started_by)?;

        let instance = self
            .instances
            .start_definition(&definition, variables, started_by)
            .await?;

        let _guard = self.instances.locks().lock(&instance.id).await;
        let mut events = Vec::new();
        let task = self
            .open_task(&instance, &definition, assignee, &mut events)
            .await?;
        publish_events(self.event_handler.as_ref(), events).await;

        Ok((instance, task))
    }

    /// Open tasks, optionally filtered by assignee, oldest first
    pub async fn list_tasks(&self, assignee: Option<&str>) -> Result<Vec<Task>, CoreError> {
        let mut tasks = self.task_repo.find_open(assignee).await?;
        tasks.sort_by(|a, b| a.create_time.cmp(&b.create_time).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Get a task by ID
    pub async fn get(&self, task_id: &TaskId) -> Result<Task, CoreError> {
        if task_id.0.trim().is_empty() {
            return Err(CoreError::ValidationError("Task ID must not be blank".to_string()));
        }
        self.task_repo
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| CoreError::TaskNotFound(task_id.0.clone()))
    }

    /// Hand an open task to another principal
    pub async fn assign(&self, task_id: &TaskId, principal: &str) -> Result<Task, CoreError> {
        let instance_id = self.get(task_id).await?.instance_id;

        let guard = self.instances.locks().lock(&instance_id).await;
        let result = self.assign_locked(task_id, principal).await;
        drop(guard);

        if result.is_err() {
            self.release_if_finished(&instance_id).await;
        }
        result
    }

    async fn assign_locked(&self, task_id: &TaskId, principal: &str) -> Result<Task, CoreError> {
        let mut task = self.get(task_id).await?;
        let previous = task.reassign(principal)?;
        self.task_repo.save(&task).await?;

        info!(task_id = %task.id, ?previous, assignee = principal, "Task assigned");

        let event: Box<dyn DomainEvent> = Box::new(TaskAssigned {
            instance_id: task.instance_id.clone(),
            task_id: task.id.clone(),
            previous,
            assignee: principal.to_string(),
            timestamp: Utc::now(),
        });
        publish_events(self.event_handler.as_ref(), vec![event]).await;

        Ok(task)
    }

    /// Complete a task with the variables its step collects
    ///
    /// Of two concurrent completions of the same task exactly one succeeds;
    /// the other sees [`CoreError::TaskAlreadyCompleted`].
    pub async fn complete(
        &self,
        task_id: &TaskId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<CompletionOutcome, CoreError> {
        let span = info_span!("complete_task", task_id = %task_id);

        async move {
            let instance_id = self.get(task_id).await?.instance_id;

            let guard = self.instances.locks().lock(&instance_id).await;
            let result = self.complete_locked(task_id, variables, actor).await;
            drop(guard);

            match &result {
                Ok(outcome) if outcome.instance_status == InstanceStatus::Completed => {
                    self.instances.locks().release(&instance_id)
                }
                Ok(_) => {}
                Err(_) => self.release_if_finished(&instance_id).await,
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn complete_locked(
        &self,
        task_id: &TaskId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<CompletionOutcome, CoreError> {
        // Re-read under the lock; a racing completion may have closed it
        let task = self.get(task_id).await?;
        if !task.is_open() {
            return Err(CoreError::TaskAlreadyCompleted(task.id.0.clone()));
        }

        let instance = self.instances.get(&task.instance_id).await?;
        if instance.is_completed() || instance.current_step != task.step_index {
            return Err(CoreError::ValidationError(format!(
                "Task {} does not belong to the active step of instance {}",
                task.id, instance.id
            )));
        }

        let definition = self.definitions.get(&instance.definition_id).await?;
        let step = definition.step(task.step_index).ok_or_else(|| {
            CoreError::ValidationError(format!(
                "Process {} has no step at index {}",
                definition.id, task.step_index
            ))
        })?;
        step.validate_inputs(&variables)?;

        let task_id = task.id.clone();
        let transition = self
            .transition_locked(instance, &definition, vec![task], variables, actor)
            .await?;

        let task = transition
            .closed
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::TaskNotFound(task_id.0.clone()))?;

        Ok(CompletionOutcome {
            task,
            instance_id: transition.instance.id.clone(),
            instance_status: transition.instance.status,
            next_task: transition.next_task,
        })
    }

    /// Move an instance past its current step
    ///
    /// The open task of the step is closed on behalf of `actor`, or of its
    /// assignee when no actor is given. The next task is opened, or the
    /// history log records the instance when it ends, the same way
    /// [`complete`](Self::complete) does. Step inputs are not validated.
    pub async fn advance(
        &self,
        instance_id: &ProcessInstanceId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<(ProcessInstance, AdvanceOutcome), CoreError> {
        let span = info_span!("advance_instance", instance_id = %instance_id);

        async move {
            let guard = self.instances.locks().lock(instance_id).await;
            let result = self.advance_locked(instance_id, variables, actor).await;
            drop(guard);

            match &result {
                Ok((_, AdvanceOutcome::Completed)) => self.instances.locks().release(instance_id),
                Ok(_) => {}
                Err(_) => self.release_if_finished(instance_id).await,
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn advance_locked(
        &self,
        instance_id: &ProcessInstanceId,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<(ProcessInstance, AdvanceOutcome), CoreError> {
        let instance = self.instances.get(instance_id).await?;
        let definition = self.definitions.get(&instance.definition_id).await?;

        let open: Vec<Task> = self
            .task_repo
            .find_open_for_instance(instance_id)
            .await?
            .into_iter()
            .filter(|task| task.step_index == instance.current_step)
            .collect();

        let transition = self
            .transition_locked(instance, &definition, open, variables, actor)
            .await?;
        Ok((transition.instance, transition.outcome))
    }

    /// The one write path for step transitions
    ///
    /// Order: close `open`, advance the instance, open the next task. A
    /// failed write puts back what was already stored so the step can be
    /// retried. Events are published only once everything is stored.
    /// Callers hold the instance lock.
    async fn transition_locked(
        &self,
        instance: ProcessInstance,
        definition: &ProcessDefinition,
        open: Vec<Task>,
        variables: Variables,
        actor: Option<&str>,
    ) -> Result<Transition, CoreError> {
        if instance.is_completed() {
            return Err(CoreError::ValidationError(format!(
                "Instance {} is already completed",
                instance.id
            )));
        }

        // Check the whole transition before writing anything
        let mut merged = instance.variables.clone();
        merged.extend(variables.clone());
        let next_assignee = match definition.next_step(instance.current_step, &merged)? {
            Some(next) => match definition.step(next) {
                Some(next_step) => next_step.resolve_assignee(&merged, &instance.started_by)?,
                None => None,
            },
            None => None,
        };

        let mut closed = Vec::with_capacity(open.len());
        for original in &open {
            let mut task = original.clone();
            let completed_by = actor
                .or(task.assignee.as_deref())
                .unwrap_or(ANONYMOUS)
                .to_string();
            let stored = match task.complete(&completed_by) {
                Ok(()) => self.task_repo.save(&task).await,
                Err(e) => Err(e),
            };
            if let Err(e) = stored {
                self.roll_back(&open[..closed.len()], None).await;
                return Err(e);
            }
            closed.push(task);
        }

        let snapshot = instance.clone();
        let (mut advanced, outcome) = match self
            .instances
            .advance_locked(instance, definition, variables)
            .await
        {
            Ok(advanced) => advanced,
            Err(e) => {
                self.roll_back(&open, None).await;
                return Err(e);
            }
        };

        let mut events: Vec<Box<dyn DomainEvent>> = Vec::new();
        let next_task = match outcome {
            AdvanceOutcome::Moved { .. } => {
                match self
                    .open_task(&advanced, definition, next_assignee, &mut events)
                    .await
                {
                    Ok(task) => Some(task),
                    Err(e) => {
                        self.roll_back(&open, Some(&snapshot)).await;
                        return Err(e);
                    }
                }
            }
            AdvanceOutcome::Completed => None,
        };

        let mut completions: Vec<Box<dyn DomainEvent>> = Vec::with_capacity(closed.len());
        for task in &closed {
            info!(
                task_id = %task.id,
                instance_id = %task.instance_id,
                completed_by = ?task.completed_by,
                "Task completed"
            );
            completions.push(Box::new(TaskCompleted {
                instance_id: task.instance_id.clone(),
                task_id: task.id.clone(),
                completed_by: task.completed_by.clone().unwrap_or_default(),
                timestamp: Utc::now(),
            }));
        }

        self.instances.publish(&mut advanced).await;
        publish_events(self.event_handler.as_ref(), completions).await;
        publish_events(self.event_handler.as_ref(), events).await;

        if outcome == AdvanceOutcome::Completed {
            self.history.record(&advanced).await;
        }

        Ok(Transition {
            instance: advanced,
            outcome,
            closed,
            next_task,
        })
    }

    /// Undo the writes of a transition that failed halfway
    ///
    /// The caller reports the original error; failures here are only logged.
    async fn roll_back(&self, reopen: &[Task], snapshot: Option<&ProcessInstance>) {
        if let Some(snapshot) = snapshot {
            if let Err(e) = self.instances.restore(snapshot).await {
                warn!(instance_id = %snapshot.id, error = %e, "Failed to restore process instance");
            }
        }
        for task in reopen {
            if let Err(e) = self.task_repo.save(task).await {
                warn!(task_id = %task.id, error = %e, "Failed to reopen task");
            }
        }
    }

    /// Drop the lock entry of an instance that has ended
    async fn release_if_finished(&self, instance_id: &ProcessInstanceId) {
        match self.instances.get(instance_id).await {
            Ok(instance) if !instance.is_completed() => {}
            _ => self.instances.locks().release(instance_id),
        }
    }

    /// Create the task of the instance's current step
    ///
    /// Callers hold the instance lock and publish `events` once their writes
    /// are done. An open task that already exists for the step is returned
    /// instead of creating a second one.
    async fn open_task(
        &self,
        instance: &ProcessInstance,
        definition: &ProcessDefinition,
        assignee: Option<String>,
        events: &mut Vec<Box<dyn DomainEvent>>,
    ) -> Result<Task, CoreError> {
        let existing = self.task_repo.find_open_for_instance(&instance.id).await?;
        if let Some(task) = existing
            .into_iter()
            .find(|t| t.step_index == instance.current_step)
        {
            return Ok(task);
        }

        let step = definition.step(instance.current_step).ok_or_else(|| {
            CoreError::ValidationError(format!(
                "Process {} has no step at index {}",
                definition.id, instance.current_step
            ))
        })?;

        let task = Task::for_step(instance, step, assignee);
        self.task_repo.save(&task).await?;

        info!(
            task_id = %task.id,
            instance_id = %instance.id,
            step = %task.step_id,
            assignee = ?task.assignee,
            "Task created"
        );

        events.push(Box::new(TaskCreated {
            instance_id: instance.id.clone(),
            task_id: task.id.clone(),
            step_index: task.step_index,
            assignee: task.assignee.clone(),
            timestamp: task.create_time,
        }));

        Ok(task)
    }
}
