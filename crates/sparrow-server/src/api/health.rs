//! Health check endpoint for the Sparrow Server

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::server::SparrowServer;

/// Health check handler
///
/// Reports the server version and whether the engine can list its
/// published definitions.
pub async fn health_check(State(server): State<Arc<SparrowServer>>) -> impl IntoResponse {
    debug!("Health check requested");

    let mut response = json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {},
    });

    let status = match server.engine().list_definitions().await {
        Ok(definitions) => {
            response["dependencies"]["engine"] = json!({
                "status": "UP",
                "definitions": definitions.len(),
            });
            StatusCode::OK
        }
        Err(e) => {
            warn!(error = %e, "Engine health check failed");
            response["status"] = json!("DOWN");
            response["dependencies"]["engine"] = json!({ "status": "DOWN" });
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    (status, Json(response))
}
