//! Leave request API
//!
//! Handlers for the two-step leave process. Parameters come from the query
//! string for both GET and POST.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sparrow_core::{
    variables, HistoryQuery, HistoryRecord, Task, TaskId, VariableKind, VariableValue, Variables,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::errors::ApiError;
use crate::server::SparrowServer;

const SUCCESS: &str = "success";
const FAIL: &str = "fail";

/// Query parameters carrying an employee job number
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobNumberQuery {
    /// Employee job number
    pub job_number: Option<String>,
}

impl JobNumberQuery {
    fn job_number(&self) -> Option<&str> {
        self.job_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Query parameters of the employee application step
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeApplyQuery {
    pub task_id: Option<String>,
    pub dept_job_number: Option<String>,
    pub leave_days: Option<String>,
    pub leave_reason: Option<String>,
}

/// Query parameters of the manager audit step
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeptManagerAuditQuery {
    pub task_id: Option<String>,
    pub audit_opinion: Option<String>,
    pub audit: Option<String>,
}

/// Task as listed by `showTask`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task_id: String,
    pub name: String,
    pub create_time: DateTime<Utc>,
    pub instance_id: String,
    pub assignee: Option<String>,
    pub execution_id: String,
    pub definition_id: String,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            execution_id: task.execution_id().to_string(),
            task_id: task.id.0,
            name: task.name,
            create_time: task.create_time,
            instance_id: task.instance_id.0,
            assignee: task.assignee,
            definition_id: task.definition_id.0,
        }
    }
}

/// Finished leave request as listed by `historyList`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub start_user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub variables: Variables,
}

impl From<HistoryRecord> for HistoryView {
    fn from(record: HistoryRecord) -> Self {
        Self {
            start_user_id: record.started_by,
            start_time: record.start_time,
            end_time: record.end_time,
            variables: record.variables,
        }
    }
}

/// Start a leave request for `jobNumber`; responds with the instance id
pub async fn start_handler(
    State(server): State<Arc<SparrowServer>>,
    Query(query): Query<JobNumberQuery>,
) -> Result<String, ApiError> {
    let job_number = query
        .job_number()
        .ok_or_else(|| ApiError::BadRequest("jobNumber is required".to_string()))?;

    let instance_id = server
        .engine()
        .start_process(
            server.leave_process_key(),
            variables([("jobNumber", job_number)]),
            job_number,
        )
        .await?;

    info!(instance_id = %instance_id, job_number, "Leave request started");
    Ok(instance_id.0)
}

/// Open tasks, optionally only those assigned to `jobNumber`
pub async fn show_task_handler(
    State(server): State<Arc<SparrowServer>>,
    Query(query): Query<JobNumberQuery>,
) -> Result<Json<Vec<TaskView>>, ApiError> {
    let tasks = server.engine().list_tasks(query.job_number()).await?;
    Ok(Json(tasks.into_iter().map(TaskView::from).collect()))
}

/// Complete the employee application task
pub async fn employee_apply_handler(
    State(server): State<Arc<SparrowServer>>,
    Query(query): Query<EmployeeApplyQuery>,
) -> &'static str {
    let mut vars = Variables::new();

    if let Some(days) = query.leave_days.as_deref() {
        match VariableValue::parse_as(VariableKind::Number, days) {
            Ok(days) => {
                vars.insert("days".to_string(), days);
            }
            Err(e) => {
                warn!(error = %e, "Rejected leave application");
                return FAIL;
            }
        }
    }
    vars.insert("date".to_string(), VariableValue::from(Utc::now()));
    if let Some(reason) = query.leave_reason {
        vars.insert("reason".to_string(), VariableValue::from(reason));
    }
    if let Some(dept) = query.dept_job_number {
        vars.insert("deptJobNumber".to_string(), VariableValue::from(dept));
    }

    complete(&server, query.task_id, vars).await
}

/// Complete the department manager audit task
pub async fn dept_manager_audit_handler(
    State(server): State<Arc<SparrowServer>>,
    Query(query): Query<DeptManagerAuditQuery>,
) -> &'static str {
    let mut vars = Variables::new();
    if let Some(audit) = query.audit {
        vars.insert("audit".to_string(), VariableValue::from(audit));
    }
    if let Some(opinion) = query.audit_opinion {
        vars.insert("auditOpinion".to_string(), VariableValue::from(opinion));
    }

    complete(&server, query.task_id, vars).await
}

/// Finished leave requests started by `jobNumber`, latest first
pub async fn history_list_handler(
    State(server): State<Arc<SparrowServer>>,
    Query(query): Query<JobNumberQuery>,
) -> Result<Json<Vec<HistoryView>>, ApiError> {
    let mut history_query = HistoryQuery::finished(server.leave_process_key());
    if let Some(job_number) = query.job_number() {
        history_query = history_query.started_by(job_number);
    }

    let records = server.engine().query_history(&history_query).await?;
    Ok(Json(records.into_iter().map(HistoryView::from).collect()))
}

async fn complete(server: &SparrowServer, task_id: Option<String>, vars: Variables) -> &'static str {
    let task_id = TaskId(task_id.unwrap_or_default());

    match server.engine().complete_task(&task_id, vars, None).await {
        Ok(outcome) => {
            info!(
                task_id = %task_id,
                instance_id = %outcome.instance_id,
                status = ?outcome.instance_status,
                "Task completed via API"
            );
            SUCCESS
        }
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Task completion failed");
            FAIL
        }
    }
}
