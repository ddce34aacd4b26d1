use crate::{
    domain::events::{DomainEvent, InstanceCompleted, InstanceStarted, StepAdvanced},
    domain::process_definition::{DefinitionKey, ProcessDefinition, ProcessDefinitionId},
    types::Variables,
    CoreError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Process instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Instance is waiting on the task of its current step
    Running,

    /// Instance left its last step
    Completed,
}

/// Value object: Process instance ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessInstanceId(pub String);

impl fmt::Display for ProcessInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate: Process instance
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessInstance {
    /// Unique identifier
    pub id: ProcessInstanceId,

    /// Definition version the instance runs
    pub definition_id: ProcessDefinitionId,

    /// Key of the definition
    pub definition_key: DefinitionKey,

    /// Index of the active step
    pub current_step: usize,

    /// Variable bindings
    pub variables: Variables,

    /// Current status
    pub status: InstanceStatus,

    /// Principal that started the instance
    pub started_by: String,

    /// Start timestamp
    pub start_time: DateTime<Utc>,

    /// Set once the instance completes
    pub end_time: Option<DateTime<Utc>>,

    /// Domain events
    #[serde(skip)]
    pub events: Vec<Box<dyn DomainEvent>>,
}

impl Clone for ProcessInstance {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            definition_id: self.definition_id.clone(),
            definition_key: self.definition_key.clone(),
            current_step: self.current_step,
            variables: self.variables.clone(),
            status: self.status,
            started_by: self.started_by.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            events: Vec::new(), // We don't clone domain events
        }
    }
}

impl ProcessInstance {
    /// Create a new instance positioned at step 0 of `definition`
    pub fn new(definition: &ProcessDefinition, variables: Variables, started_by: &str) -> Self {
        let now = Utc::now();
        let mut instance = Self {
            id: ProcessInstanceId(Uuid::new_v4().to_string()),
            definition_id: definition.id.clone(),
            definition_key: definition.key.clone(),
            current_step: 0,
            variables,
            status: InstanceStatus::Running,
            started_by: started_by.to_string(),
            start_time: now,
            end_time: None,
            events: Vec::with_capacity(4),
        };

        instance.record_event(Box::new(InstanceStarted {
            instance_id: instance.id.clone(),
            definition_id: instance.definition_id.clone(),
            started_by: instance.started_by.clone(),
            timestamp: now,
        }));

        instance
    }

    /// Whether the instance has completed
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == InstanceStatus::Completed
    }

    fn ensure_running(&self, action: &str) -> Result<(), CoreError> {
        if self.is_completed() {
            return Err(CoreError::ValidationError(format!(
                "Cannot {} instance {}: it is already completed",
                action, self.id
            )));
        }
        Ok(())
    }

    /// Merge variables into the instance; later values win
    pub fn merge_variables(&mut self, variables: Variables) -> Result<(), CoreError> {
        self.ensure_running("update variables of")?;
        self.variables.extend(variables);
        Ok(())
    }

    /// Make `step` the active step
    pub fn move_to(&mut self, step: usize) -> Result<(), CoreError> {
        self.ensure_running("advance")?;

        let from_step = self.current_step;
        self.current_step = step;

        self.record_event(Box::new(StepAdvanced {
            instance_id: self.id.clone(),
            from_step,
            to_step: step,
            timestamp: Utc::now(),
        }));

        Ok(())
    }

    /// Complete the instance
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.ensure_running("complete")?;

        let now = Utc::now();
        self.status = InstanceStatus::Completed;
        self.end_time = Some(now);

        self.record_event(Box::new(InstanceCompleted {
            instance_id: self.id.clone(),
            timestamp: now,
        }));

        Ok(())
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Get and clear all domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::variables;

    fn published_leave_process() -> ProcessDefinition {
        let mut def = ProcessDefinition::leave_process();
        def.version = 1;
        def.id = ProcessDefinitionId::for_version(&def.key, 1);
        def
    }

    #[test]
    fn test_instance_creation() {
        let def = published_leave_process();
        let mut instance = ProcessInstance::new(&def, variables([("jobNumber", "A1001")]), "A1001");

        assert_eq!(instance.definition_id.0, "leaveProcess:1");
        assert_eq!(instance.current_step, 0);
        assert_eq!(instance.status, InstanceStatus::Running);
        assert!(instance.end_time.is_none());
        assert_eq!(instance.variables["jobNumber"].as_str(), Some("A1001"));

        let events = instance.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "instance.started");
        assert!(instance.take_events().is_empty());
    }

    #[test]
    fn test_move_and_complete() {
        let def = published_leave_process();
        let mut instance = ProcessInstance::new(&def, Variables::new(), "A1001");
        instance.take_events();

        instance.merge_variables(variables([("deptJobNumber", "A1002")])).unwrap();
        instance.move_to(1).unwrap();
        assert_eq!(instance.current_step, 1);

        instance.complete().unwrap();
        assert!(instance.is_completed());
        assert!(instance.end_time.is_some());

        let types: Vec<_> = instance.take_events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["instance.step_advanced", "instance.completed"]);
    }

    #[test]
    fn test_completed_instance_is_frozen() {
        let def = published_leave_process();
        let mut instance = ProcessInstance::new(&def, Variables::new(), "A1001");
        instance.complete().unwrap();

        assert!(matches!(instance.complete(), Err(CoreError::ValidationError(_))));
        assert!(instance.move_to(1).is_err());
        assert!(instance.merge_variables(variables([("audit", "1")])).is_err());
        assert!(!instance.variables.contains_key("audit"));
    }

    #[test]
    fn test_clone_drops_events() {
        let def = published_leave_process();
        let instance = ProcessInstance::new(&def, Variables::new(), "A1001");
        assert_eq!(instance.events.len(), 1);
        assert!(instance.clone().events.is_empty());
    }
}
