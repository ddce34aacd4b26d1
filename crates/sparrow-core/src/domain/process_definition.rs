use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::types::{VariableKind, Variables};
use crate::CoreError;

/// Key under which successive versions of a definition are published
pub const LEAVE_PROCESS_KEY: &str = "leaveProcess";

/// Reserved transition target that terminates the instance
const END_TARGET: &str = "end";

/// Value object: Definition key (e.g. `leaveProcess`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefinitionKey(pub String);

/// Value object: Process definition ID, `<key>:<version>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessDefinitionId(pub String);

impl ProcessDefinitionId {
    /// Build the id of a given key and version
    pub fn for_version(key: &DefinitionKey, version: u32) -> Self {
        Self(format!("{}:{}", key.0, version))
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProcessDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A versioned workflow template
///
/// `id` and `version` are assigned by the registry on publish; values
/// present in a YAML document are overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// ID of the published definition
    #[serde(default)]
    pub id: ProcessDefinitionId,

    /// Key shared by all versions of this definition
    pub key: DefinitionKey,

    /// Version number, starting at 1
    #[serde(default)]
    pub version: u32,

    /// Human-readable name
    pub name: String,

    /// Description of the process
    #[serde(default)]
    pub description: Option<String>,

    /// Ordered steps; an instance starts at index 0
    pub steps: Vec<StepDefinition>,
}

/// A human step of a process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// ID of the step, unique within the definition
    pub id: String,

    /// Task name shown to the assignee
    pub name: String,

    /// Who the step's task is assigned to
    #[serde(default)]
    pub assignee: AssigneeRule,

    /// Where the instance goes once the step's task completes
    #[serde(default)]
    pub transition: TransitionRule,

    /// Variables accepted when completing the step's task
    #[serde(default)]
    pub inputs: Vec<VariableSpec>,
}

/// Assignee resolution for a step's task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum AssigneeRule {
    /// Assign to whoever started the instance
    Starter,
    /// Assign to the principal stored in an instance variable
    Variable {
        /// Variable holding the principal
        name: String,
    },
    /// Assign to a fixed principal
    Fixed {
        /// The principal
        principal: String,
    },
    /// Leave the task unassigned until someone calls `assign`
    #[default]
    Unassigned,
}

/// Outgoing transition of a step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionRule {
    /// Move to the following step, or end after the last one
    #[default]
    Next,
    /// End the instance
    End,
    /// Pick a target by comparing a variable against literal values
    Branch {
        /// Variable to inspect
        variable: String,
        /// Cases tried in order
        cases: Vec<BranchCase>,
        /// Target when no case matches or the variable is unset
        otherwise: Target,
    },
}

/// One arm of a [`TransitionRule::Branch`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCase {
    /// Literal compared against the variable's text form
    pub value: String,
    /// Where to go on a match
    pub target: Target,
}

/// Transition target: a step id, or `end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    /// Go to the step with this id
    Step(String),
    /// End the instance
    End,
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        if s == END_TARGET {
            Target::End
        } else {
            Target::Step(s)
        }
    }
}

impl From<Target> for String {
    fn from(t: Target) -> Self {
        match t {
            Target::Step(id) => id,
            Target::End => END_TARGET.to_string(),
        }
    }
}

/// Declared input of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name
    pub name: String,

    /// Expected kind
    #[serde(default = "default_kind")]
    pub kind: VariableKind,

    /// Whether completing the task without this variable is rejected
    #[serde(default)]
    pub required: bool,

    /// Allowed text values, for string inputs
    #[serde(default)]
    pub allowed: Option<Vec<String>>,
}

fn default_kind() -> VariableKind {
    VariableKind::String
}

impl VariableSpec {
    /// Required input of the given kind
    pub fn required(name: &str, kind: VariableKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            allowed: None,
        }
    }

    /// Optional input of the given kind
    pub fn optional(name: &str, kind: VariableKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Restrict a string input to a set of values
    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

impl StepDefinition {
    /// Check `vars` against the step's declared inputs
    ///
    /// Undeclared variables pass through untouched.
    pub fn validate_inputs(&self, vars: &Variables) -> Result<(), CoreError> {
        for spec in &self.inputs {
            let value = match vars.get(&spec.name) {
                Some(value) => value,
                None if spec.required => {
                    return Err(CoreError::ValidationError(format!(
                        "Step {} requires variable '{}'",
                        self.id, spec.name
                    )))
                }
                None => continue,
            };

            if value.kind() != spec.kind {
                return Err(CoreError::ValidationError(format!(
                    "Variable '{}' of step {} must be a {}, got a {}",
                    spec.name,
                    self.id,
                    spec.kind,
                    value.kind()
                )));
            }

            if let Some(text) = value.as_str() {
                if spec.required && text.trim().is_empty() {
                    return Err(CoreError::ValidationError(format!(
                        "Variable '{}' of step {} must not be blank",
                        spec.name, self.id
                    )));
                }
                if let Some(allowed) = &spec.allowed {
                    if !allowed.iter().any(|a| a == text) {
                        return Err(CoreError::ValidationError(format!(
                            "Variable '{}' of step {} must be one of {:?}, got '{}'",
                            spec.name, self.id, allowed, text
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Resolve the principal for this step's task
    pub fn resolve_assignee(
        &self,
        vars: &Variables,
        started_by: &str,
    ) -> Result<Option<String>, CoreError> {
        match &self.assignee {
            AssigneeRule::Starter => Ok(Some(started_by.to_string())),
            AssigneeRule::Fixed { principal } => Ok(Some(principal.clone())),
            AssigneeRule::Unassigned => Ok(None),
            AssigneeRule::Variable { name } => match vars.get(name) {
                Some(value) => {
                    let principal = value.to_string();
                    if principal.trim().is_empty() {
                        Err(CoreError::ValidationError(format!(
                            "Assignee variable '{}' of step {} is blank",
                            name, self.id
                        )))
                    } else {
                        Ok(Some(principal))
                    }
                }
                None => Err(CoreError::ValidationError(format!(
                    "Assignee variable '{}' of step {} is not set",
                    name, self.id
                ))),
            },
        }
    }
}

impl ProcessDefinition {
    /// Validate the definition
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.key.0.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Process definition key must not be blank".to_string(),
            ));
        }

        if self.steps.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Process {} must have at least one step",
                self.key
            )));
        }

        let mut step_ids = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() || step.id == END_TARGET {
                return Err(CoreError::ValidationError(format!(
                    "Invalid step ID '{}' in process {}",
                    step.id, self.key
                )));
            }
            if !step_ids.insert(step.id.as_str()) {
                return Err(CoreError::ValidationError(format!(
                    "Duplicate step ID: {}",
                    step.id
                )));
            }
        }

        for step in &self.steps {
            self.validate_step(step, &step_ids)?;
        }

        Ok(())
    }

    fn validate_step(&self, step: &StepDefinition, step_ids: &HashSet<&str>) -> Result<(), CoreError> {
        match &step.assignee {
            AssigneeRule::Variable { name } if name.trim().is_empty() => {
                return Err(CoreError::ValidationError(format!(
                    "Step {} has an assignee rule without a variable name",
                    step.id
                )));
            }
            AssigneeRule::Fixed { principal } if principal.trim().is_empty() => {
                return Err(CoreError::ValidationError(format!(
                    "Step {} has a blank fixed assignee",
                    step.id
                )));
            }
            _ => {}
        }

        if let TransitionRule::Branch {
            variable,
            cases,
            otherwise,
        } = &step.transition
        {
            if variable.trim().is_empty() {
                return Err(CoreError::ValidationError(format!(
                    "Step {} branches on a blank variable name",
                    step.id
                )));
            }
            for target in cases.iter().map(|c| &c.target).chain(std::iter::once(otherwise)) {
                if let Target::Step(id) = target {
                    if !step_ids.contains(id.as_str()) {
                        return Err(CoreError::ValidationError(format!(
                            "Step {} references non-existent step: {}",
                            step.id, id
                        )));
                    }
                }
            }
        }

        let mut input_names = HashSet::new();
        for spec in &step.inputs {
            if spec.name.trim().is_empty() || !input_names.insert(spec.name.as_str()) {
                return Err(CoreError::ValidationError(format!(
                    "Step {} declares a blank or duplicate input '{}'",
                    step.id, spec.name
                )));
            }
            if spec.allowed.is_some() && spec.kind != VariableKind::String {
                return Err(CoreError::ValidationError(format!(
                    "Input '{}' of step {} restricts values but is not a string",
                    spec.name, step.id
                )));
            }
        }

        Ok(())
    }

    /// Step at `index`
    #[inline]
    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Index of the step with the given id
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    /// Evaluate the transition of step `index` against `vars`
    ///
    /// Returns the next step index, or `None` when the instance ends.
    pub fn next_step(&self, index: usize, vars: &Variables) -> Result<Option<usize>, CoreError> {
        let step = self.step(index).ok_or_else(|| {
            CoreError::ValidationError(format!(
                "Process {} has no step at index {}",
                self.id, index
            ))
        })?;

        let target = match &step.transition {
            TransitionRule::Next => {
                return Ok(if index + 1 < self.steps.len() {
                    Some(index + 1)
                } else {
                    None
                })
            }
            TransitionRule::End => return Ok(None),
            TransitionRule::Branch {
                variable,
                cases,
                otherwise,
            } => {
                let actual = vars.get(variable).map(|v| v.to_string());
                cases
                    .iter()
                    .find(|c| actual.as_deref() == Some(c.value.as_str()))
                    .map(|c| &c.target)
                    .unwrap_or(otherwise)
            }
        };

        match target {
            Target::End => Ok(None),
            Target::Step(id) => self.step_index(id).map(Some).ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "Step {} references non-existent step: {}",
                    step.id, id
                ))
            }),
        }
    }

    /// Parse one or more YAML documents into unpublished definitions
    pub fn from_yaml(source: &str) -> Result<Vec<ProcessDefinition>, CoreError> {
        let mut definitions = Vec::new();
        for document in serde_yaml::Deserializer::from_str(source) {
            definitions.push(ProcessDefinition::deserialize(document)?);
        }
        Ok(definitions)
    }

    /// The two-step leave request: the employee applies, the department
    /// manager named in `deptJobNumber` audits
    ///
    /// Both audit outcomes end the process; the decision is kept in the
    /// `audit` variable of the history record.
    pub fn leave_process() -> Self {
        Self {
            id: ProcessDefinitionId::default(),
            key: DefinitionKey(LEAVE_PROCESS_KEY.to_string()),
            version: 0,
            name: "Leave request".to_string(),
            description: Some("Employee applies for leave, department manager audits".to_string()),
            steps: vec![
                StepDefinition {
                    id: "employeeApply".to_string(),
                    name: "Employee apply".to_string(),
                    assignee: AssigneeRule::Variable {
                        name: "jobNumber".to_string(),
                    },
                    transition: TransitionRule::Next,
                    inputs: vec![
                        VariableSpec::required("days", VariableKind::Number),
                        VariableSpec::required("date", VariableKind::Date),
                        VariableSpec::optional("reason", VariableKind::String),
                        VariableSpec::required("deptJobNumber", VariableKind::String),
                    ],
                },
                StepDefinition {
                    id: "deptManagerAudit".to_string(),
                    name: "Department manager audit".to_string(),
                    assignee: AssigneeRule::Variable {
                        name: "deptJobNumber".to_string(),
                    },
                    transition: TransitionRule::End,
                    inputs: vec![
                        VariableSpec::required("audit", VariableKind::String).one_of(&["0", "1"]),
                        VariableSpec::optional("auditOpinion", VariableKind::String),
                    ],
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{variables, VariableValue};

    fn approval_loop() -> ProcessDefinition {
        let mut def = ProcessDefinition::leave_process();
        def.steps[1].transition = TransitionRule::Branch {
            variable: "audit".to_string(),
            cases: vec![BranchCase {
                value: "0".to_string(),
                target: Target::Step("employeeApply".to_string()),
            }],
            otherwise: Target::End,
        };
        def
    }

    #[test]
    fn test_leave_process_is_valid() {
        let def = ProcessDefinition::leave_process();
        def.validate().unwrap();
        assert_eq!(def.key.0, LEAVE_PROCESS_KEY);
        assert_eq!(def.step_index("deptManagerAudit"), Some(1));
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicate_steps() {
        let mut def = ProcessDefinition::leave_process();
        def.steps.clear();
        assert!(matches!(def.validate(), Err(CoreError::ValidationError(_))));

        let mut def = ProcessDefinition::leave_process();
        def.steps[1].id = "employeeApply".to_string();
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate step ID"));
    }

    #[test]
    fn test_validate_rejects_unknown_branch_target() {
        let mut def = approval_loop();
        if let TransitionRule::Branch { otherwise, .. } = &mut def.steps[1].transition {
            *otherwise = Target::Step("hrArchive".to_string());
        }
        let err = def.validate().unwrap_err();
        assert!(err.to_string().contains("hrArchive"));
    }

    #[test]
    fn test_next_step_linear_and_terminal() {
        let def = ProcessDefinition::leave_process();
        let vars = Variables::new();
        assert_eq!(def.next_step(0, &vars).unwrap(), Some(1));
        assert_eq!(def.next_step(1, &vars).unwrap(), None);
        assert!(def.next_step(2, &vars).is_err());
    }

    #[test]
    fn test_next_step_branch() {
        let def = approval_loop();
        let rejected = variables([("audit", "0")]);
        let approved = variables([("audit", "1")]);
        assert_eq!(def.next_step(1, &rejected).unwrap(), Some(0));
        assert_eq!(def.next_step(1, &approved).unwrap(), None);
        assert_eq!(def.next_step(1, &Variables::new()).unwrap(), None);
    }

    #[test]
    fn test_validate_inputs() {
        let def = ProcessDefinition::leave_process();
        let audit = &def.steps[1];

        assert!(audit.validate_inputs(&variables([("audit", "1")])).is_ok());
        assert!(audit.validate_inputs(&variables([("audit", "maybe")])).is_err());
        assert!(audit.validate_inputs(&Variables::new()).is_err());

        let apply = &def.steps[0];
        let mut vars = variables([("deptJobNumber", "A1002")]);
        vars.insert("days".to_string(), VariableValue::from("two"));
        vars.insert("date".to_string(), VariableValue::from(chrono::Utc::now()));
        let err = apply.validate_inputs(&vars).unwrap_err();
        assert!(err.to_string().contains("must be a number"));
    }

    #[test]
    fn test_resolve_assignee() {
        let def = ProcessDefinition::leave_process();
        let vars = variables([("jobNumber", "A1001")]);
        assert_eq!(
            def.steps[0].resolve_assignee(&vars, "A1001").unwrap(),
            Some("A1001".to_string())
        );
        assert!(def.steps[1].resolve_assignee(&vars, "A1001").is_err());

        let mut step = def.steps[1].clone();
        step.assignee = AssigneeRule::Starter;
        assert_eq!(
            step.resolve_assignee(&vars, "A1009").unwrap(),
            Some("A1009".to_string())
        );
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
key: expenseClaim
name: Expense claim
steps:
  - id: submit
    name: Submit claim
    assignee: { rule: starter }
    inputs:
      - { name: amount, kind: number, required: true }
  - id: review
    name: Finance review
    assignee: { rule: fixed, principal: F0001 }
    transition:
      type: branch
      variable: approved
      cases:
        - { value: "no", target: submit }
      otherwise: end
    inputs:
      - { name: approved, required: true, allowed: ["yes", "no"] }
---
key: overtime
name: Overtime
steps:
  - { id: request, name: Request }
"#;
        let defs = ProcessDefinition::from_yaml(yaml).unwrap();
        assert_eq!(defs.len(), 2);
        defs[0].validate().unwrap();
        defs[1].validate().unwrap();

        assert_eq!(defs[0].steps[0].assignee, AssigneeRule::Starter);
        assert_eq!(defs[0].steps[0].inputs[0].kind, VariableKind::Number);
        assert_eq!(
            defs[0].next_step(1, &variables([("approved", "no")])).unwrap(),
            Some(0)
        );
        assert_eq!(defs[1].steps[0].assignee, AssigneeRule::Unassigned);
        assert_eq!(defs[1].steps[0].transition, TransitionRule::Next);
    }
}
