//! API module for the Sparrow Server
//!
//! This module contains the API routes and handlers for the Sparrow Server.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod errors;
pub mod health;
pub mod leave;

use crate::server::SparrowServer;

/// Build the router for API endpoints
pub fn build_router(server: Arc<SparrowServer>) -> Router {
    Router::new()
        // Leave process; every endpoint takes GET or POST
        .route(
            "/leave/start",
            get(leave::start_handler).post(leave::start_handler),
        )
        .route(
            "/leave/showTask",
            get(leave::show_task_handler).post(leave::show_task_handler),
        )
        .route(
            "/leave/employeeApply",
            get(leave::employee_apply_handler).post(leave::employee_apply_handler),
        )
        .route(
            "/leave/deptManagerAudit",
            get(leave::dept_manager_audit_handler).post(leave::dept_manager_audit_handler),
        )
        .route(
            "/leave/historyList",
            get(leave::history_list_handler).post(leave::history_list_handler),
        )
        // Health check
        .route("/health", get(health::health_check))
        .layer(TraceLayer::new_for_http())
        // Shared state
        .with_state(server)
}
