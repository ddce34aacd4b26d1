use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use sparrow_core::{
    CompletionOutcome, CoreError, HistoryQuery, HistoryRecord, ProcessDefinition,
    ProcessInstance, ProcessInstanceId, Task, TaskId, Variables, WorkflowEngine,
};
use sparrow_server::{api::build_router, create_engine, ServerConfig, ServerError, SparrowServer};

/// Engine whose storage is unavailable
struct UnavailableEngine;

fn unavailable() -> CoreError {
    CoreError::StateStoreError("unavailable".to_string())
}

#[async_trait]
impl WorkflowEngine for UnavailableEngine {
    async fn publish_definition(&self, _definition: ProcessDefinition) -> Result<ProcessDefinition, CoreError> {
        Err(unavailable())
    }
    async fn list_definitions(&self) -> Result<Vec<ProcessDefinition>, CoreError> {
        Err(unavailable())
    }
    async fn start_process(&self, key: &str, _variables: Variables, _started_by: &str) -> Result<ProcessInstanceId, CoreError> {
        Err(CoreError::DefinitionNotFound(key.to_string()))
    }
    async fn get_instance(&self, id: &ProcessInstanceId) -> Result<ProcessInstance, CoreError> {
        Err(CoreError::InstanceNotFound(id.0.clone()))
    }
    async fn advance_instance(&self, id: &ProcessInstanceId, _variables: Variables, _actor: Option<&str>) -> Result<ProcessInstance, CoreError> {
        Err(CoreError::InstanceNotFound(id.0.clone()))
    }
    async fn list_tasks(&self, _assignee: Option<&str>) -> Result<Vec<Task>, CoreError> {
        Err(unavailable())
    }
    async fn get_task(&self, id: &TaskId) -> Result<Task, CoreError> {
        Err(CoreError::TaskNotFound(id.0.clone()))
    }
    async fn assign_task(&self, id: &TaskId, _principal: &str) -> Result<Task, CoreError> {
        Err(CoreError::TaskNotFound(id.0.clone()))
    }
    async fn complete_task(&self, id: &TaskId, _variables: Variables, _actor: Option<&str>) -> Result<CompletionOutcome, CoreError> {
        Err(CoreError::TaskAlreadyCompleted(id.0.clone()))
    }
    async fn query_history(&self, _query: &HistoryQuery) -> Result<Vec<HistoryRecord>, CoreError> {
        Err(unavailable())
    }
}

async fn test_router() -> Router {
    let config = ServerConfig::default();
    let engine = create_engine(&config).await.unwrap();
    build_router(Arc::new(SparrowServer::new(config, engine)))
}

fn unavailable_router() -> Router {
    build_router(Arc::new(SparrowServer::new(
        ServerConfig::default(),
        Arc::new(UnavailableEngine),
    )))
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn call_json(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let (status, body) = call(app, method, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

async fn only_task_id(app: &Router, job_number: &str) -> String {
    let (status, tasks) =
        call_json(app, Method::GET, &format!("/leave/showTask?jobNumber={}", job_number)).await;
    assert_eq!(status, StatusCode::OK);
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1, "expected one task for {}", job_number);
    tasks[0]["taskId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_router().await;

    let (status, body) = call_json(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["dependencies"]["engine"]["definitions"], 1);
}

#[tokio::test]
async fn test_leave_request_round_trip() {
    let app = test_router().await;

    let (status, instance_id) = call(&app, Method::POST, "/leave/start?jobNumber=A1001").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!instance_id.is_empty());

    let (_, tasks) = call_json(&app, Method::GET, "/leave/showTask?jobNumber=A1001").await;
    let task = &tasks[0];
    assert_eq!(task["instanceId"], instance_id.as_str());
    assert_eq!(task["executionId"], instance_id.as_str());
    assert_eq!(task["assignee"], "A1001");
    assert_eq!(task["name"], "Employee apply");
    assert_eq!(task["definitionId"], "leaveProcess:1");
    assert!(task["createTime"].is_string());

    let task_id = task["taskId"].as_str().unwrap();
    let (status, body) = call(
        &app,
        Method::POST,
        &format!(
            "/leave/employeeApply?taskId={}&deptJobNumber=A1002&leaveDays=3&leaveReason=rest",
            task_id
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "success");

    let (_, tasks) = call_json(&app, Method::GET, "/leave/showTask?jobNumber=A1001").await;
    assert_eq!(tasks, Value::Array(vec![]));

    let audit_task = only_task_id(&app, "A1002").await;
    let (_, body) = call(
        &app,
        Method::GET,
        &format!("/leave/deptManagerAudit?taskId={}&audit=1&auditOpinion=ok", audit_task),
    )
    .await;
    assert_eq!(body, "success");

    let (status, history) = call_json(&app, Method::GET, "/leave/historyList?jobNumber=A1001").await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["startUserId"], "A1001");
    assert!(history[0]["startTime"].is_string());
    assert!(history[0]["endTime"].is_string());
    assert_eq!(history[0]["variables"]["audit"], "1");
    assert_eq!(history[0]["variables"]["auditOpinion"], "ok");
    assert_eq!(history[0]["variables"]["days"], 3.0);
    assert_eq!(history[0]["variables"]["reason"], "rest");
    assert_eq!(history[0]["variables"]["deptJobNumber"], "A1002");

    let (_, others) = call_json(&app, Method::GET, "/leave/historyList?jobNumber=A2002").await;
    assert_eq!(others, Value::Array(vec![]));
}

async fn finish_leave(app: &Router, applicant: &str, manager: &str) {
    call(app, Method::POST, &format!("/leave/start?jobNumber={}", applicant)).await;
    let task_id = only_task_id(app, applicant).await;
    let uri = format!(
        "/leave/employeeApply?taskId={}&deptJobNumber={}&leaveDays=1",
        task_id, manager
    );
    assert_eq!(call(app, Method::POST, &uri).await.1, "success");
    let task_id = only_task_id(app, manager).await;
    let uri = format!("/leave/deptManagerAudit?taskId={}&audit=1", task_id);
    assert_eq!(call(app, Method::POST, &uri).await.1, "success");
}

#[tokio::test]
async fn test_history_list_without_job_number() {
    let app = test_router().await;
    finish_leave(&app, "A1001", "M1").await;
    finish_leave(&app, "A2001", "M2").await;
    // Still running, so never listed
    call(&app, Method::POST, "/leave/start?jobNumber=A3001").await;

    let (status, history) = call_json(&app, Method::GET, "/leave/historyList").await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    let mut starters: Vec<_> = history
        .iter()
        .map(|record| record["startUserId"].as_str().unwrap())
        .collect();
    starters.sort();
    assert_eq!(starters, vec!["A1001", "A2001"]);
    assert!(history.iter().all(|record| record["endTime"].is_string()));

    let (_, mine) = call_json(&app, Method::GET, "/leave/historyList?jobNumber=A1001").await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_completion_fails() {
    let app = test_router().await;
    call(&app, Method::POST, "/leave/start?jobNumber=A1001").await;
    let task_id = only_task_id(&app, "A1001").await;

    let uri = format!(
        "/leave/employeeApply?taskId={}&deptJobNumber=A1002&leaveDays=2",
        task_id
    );
    assert_eq!(call(&app, Method::POST, &uri).await.1, "success");
    assert_eq!(call(&app, Method::POST, &uri).await.1, "fail");

    let (_, tasks) = call_json(&app, Method::GET, "/leave/showTask").await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_parameters_fail() {
    let app = test_router().await;
    call(&app, Method::POST, "/leave/start?jobNumber=A1001").await;
    let task_id = only_task_id(&app, "A1001").await;

    for uri in [
        format!("/leave/employeeApply?taskId={}&deptJobNumber=A1002&leaveDays=abc", task_id),
        format!("/leave/employeeApply?taskId={}&leaveDays=2", task_id),
        format!("/leave/employeeApply?taskId={}&deptJobNumber=A1002", task_id),
        "/leave/employeeApply?taskId=no-such-task&deptJobNumber=A1002&leaveDays=2".to_string(),
        "/leave/employeeApply?deptJobNumber=A1002&leaveDays=2".to_string(),
    ] {
        let (status, body) = call(&app, Method::POST, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "fail", "{}", uri);
    }

    // Still waiting on the applicant
    assert_eq!(only_task_id(&app, "A1001").await, task_id);

    let uri = format!("/leave/employeeApply?taskId={}&deptJobNumber=A1002&leaveDays=1", task_id);
    assert_eq!(call(&app, Method::POST, &uri).await.1, "success");
    let audit_task = only_task_id(&app, "A1002").await;
    let (_, body) = call(
        &app,
        Method::POST,
        &format!("/leave/deptManagerAudit?taskId={}&audit=yes", audit_task),
    )
    .await;
    assert_eq!(body, "fail");
}

#[tokio::test]
async fn test_start_requires_job_number() {
    let app = test_router().await;

    let (status, body) = call_json(&app, Method::POST, "/leave/start").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_BAD_REQUEST");

    let (status, _) = call_json(&app, Method::GET, "/leave/start?jobNumber=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_show_task_empty() {
    let app = test_router().await;
    let (status, tasks) = call_json(&app, Method::GET, "/leave/showTask?jobNumber=A1001").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks, Value::Array(vec![]));
}

#[tokio::test]
async fn test_engine_errors_map_to_status_codes() {
    let app = unavailable_router();

    let (status, body) = call_json(&app, Method::GET, "/leave/showTask").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_STATE_STORE_ERROR");
    assert_eq!(body["error"], "unavailable");

    let (status, body) = call_json(&app, Method::POST, "/leave/start?jobNumber=A1001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorDetails"]["errorCode"], "ERR_NOT_FOUND");

    let (status, body) = call(&app, Method::POST, "/leave/employeeApply?taskId=t1&leaveDays=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "fail");

    let (status, body) = call_json(&app, Method::GET, "/leave/historyList?jobNumber=A1001").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorDetails"]["errorMessage"], "unavailable");

    let (status, body) = call_json(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "DOWN");
}

#[tokio::test]
async fn test_definitions_from_yaml_file() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../definitions/leave-process.yaml");
    let config = ServerConfig {
        process_definitions_path: Some(path.to_string()),
        ..ServerConfig::default()
    };

    let engine = create_engine(&config).await.unwrap();
    let definitions = engine.list_definitions().await.unwrap();
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].id.0, "leaveProcess:1");

    let app = build_router(Arc::new(SparrowServer::new(config, engine)));
    let (status, _) = call(&app, Method::POST, "/leave/start?jobNumber=A1001").await;
    assert_eq!(status, StatusCode::OK);
    only_task_id(&app, "A1001").await;
}

#[tokio::test]
async fn test_missing_leave_key_is_a_config_error() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../definitions/leave-process.yaml");
    let config = ServerConfig {
        process_definitions_path: Some(path.to_string()),
        leave_process_key: "expenseClaim".to_string(),
        ..ServerConfig::default()
    };

    assert!(matches!(
        create_engine(&config).await,
        Err(ServerError::ConfigError(_))
    ));
}
