use crate::{
    application::event_handler::{publish_events, DomainEventHandler},
    domain::process_definition::ProcessDefinition,
    domain::process_instance::{ProcessInstance, ProcessInstanceId},
    domain::repository::ProcessInstanceRepository,
    types::Variables,
    CoreError,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Per-instance mutual exclusion
///
/// Every state transition of an instance happens while holding its lock,
/// so concurrent operations on one instance are linearized while
/// different instances proceed in parallel.
#[derive(Debug, Default)]
pub struct InstanceLocks {
    locks: DashMap<ProcessInstanceId, Arc<Mutex<()>>>,
}

impl InstanceLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `instance_id`
    pub async fn lock(&self, instance_id: &ProcessInstanceId) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(instance_id.clone()).or_default().clone();
        mutex.lock_owned().await
    }

    /// Drop the lock entry of a finished instance once nobody holds it
    pub fn release(&self, instance_id: &ProcessInstanceId) {
        self.locks
            .remove_if(instance_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of tracked instances
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no instance is tracked
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Result of advancing an instance past its current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The instance is now waiting on `to_step`
    Moved {
        /// Step that was left
        from_step: usize,
        /// Step that is now active
        to_step: usize,
    },
    /// The instance ended
    Completed,
}

/// Process instance store
///
/// Owns instance persistence and the lock table. Transitions are driven by
/// the task dispatcher so that task state always follows the instance.
pub struct ProcessInstanceService {
    instance_repo: Arc<dyn ProcessInstanceRepository>,
    event_handler: Arc<dyn DomainEventHandler>,
    locks: InstanceLocks,
}

impl ProcessInstanceService {
    /// Create a new process instance service
    pub fn new(
        instance_repo: Arc<dyn ProcessInstanceRepository>,
        event_handler: Arc<dyn DomainEventHandler>,
    ) -> Self {
        Self {
            instance_repo,
            event_handler,
            locks: InstanceLocks::new(),
        }
    }

    /// Lock table shared with the task dispatcher
    pub fn locks(&self) -> &InstanceLocks {
        &self.locks
    }

    /// Create an instance of an already resolved definition version
    ///
    /// The task dispatcher opens the first task; see
    /// [`TaskService::start`](crate::application::task_dispatcher::TaskService::start).
    pub(crate) async fn start_definition(
        &self,
        definition: &ProcessDefinition,
        variables: Variables,
        started_by: &str,
    ) -> Result<ProcessInstance, CoreError> {
        if started_by.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Cannot start a process without a starting principal".to_string(),
            ));
        }

        let mut instance = ProcessInstance::new(definition, variables, started_by);

        self.instance_repo.save(&instance).await?;

        info!(
            instance_id = %instance.id,
            definition_id = %instance.definition_id,
            started_by,
            "Process instance started"
        );

        let events = instance.take_events();
        publish_events(self.event_handler.as_ref(), events).await;

        Ok(instance)
    }

    /// Get an instance by ID
    pub async fn get(&self, id: &ProcessInstanceId) -> Result<ProcessInstance, CoreError> {
        self.instance_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::InstanceNotFound(id.0.clone()))
    }

    /// Merge `variables` into `instance` and move it past its current step
    ///
    /// Callers hold the instance lock. The returned instance still carries
    /// its pending events; they are published once the whole transition
    /// has been stored.
    pub(crate) async fn advance_locked(
        &self,
        mut instance: ProcessInstance,
        definition: &ProcessDefinition,
        variables: Variables,
    ) -> Result<(ProcessInstance, AdvanceOutcome), CoreError> {
        instance.merge_variables(variables)?;

        let from_step = instance.current_step;
        let outcome = match definition.next_step(from_step, &instance.variables)? {
            Some(to_step) => {
                instance.move_to(to_step)?;
                AdvanceOutcome::Moved { from_step, to_step }
            }
            None => {
                instance.complete()?;
                AdvanceOutcome::Completed
            }
        };

        self.instance_repo.save(&instance).await?;

        debug!(instance_id = %instance.id, ?outcome, "Process instance advanced");

        Ok((instance, outcome))
    }

    /// Put back a snapshot taken before a transition that failed halfway
    pub(crate) async fn restore(&self, snapshot: &ProcessInstance) -> Result<(), CoreError> {
        self.instance_repo.save(snapshot).await
    }

    /// Publish the events an instance recorded during a transition
    pub(crate) async fn publish(&self, instance: &mut ProcessInstance) {
        let events = instance.take_events();
        publish_events(self.event_handler.as_ref(), events).await;
    }
}
