//! Error handling for the Sparrow Server API
//!
//! This module contains standardized error handling for the API.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use sparrow_core::CoreError;

use crate::error::ServerError;

/// API Error type for returning standard error responses
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),
    /// Wrapped server error
    ServerError(ServerError),
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        ApiError::ServerError(err)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::ServerError(err.into())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::ServerError(err) => write!(f, "Server Error: {}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "ERR_BAD_REQUEST".to_string(), msg),
            ApiError::ServerError(err) => server_error_parts(&err),
        };

        let body = Json(json!({
            "error": message,
            "errorDetails": {
                "errorCode": error_code,
                "errorMessage": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Status code, error code and message for a server error
fn server_error_parts(err: &ServerError) -> (StatusCode, String, String) {
    match err {
        ServerError::NotFound(resource) => (
            StatusCode::NOT_FOUND,
            "ERR_NOT_FOUND".to_string(),
            format!("{} not found", resource),
        ),
        ServerError::Conflict(msg) => (StatusCode::CONFLICT, "ERR_CONFLICT".to_string(), msg.clone()),
        ServerError::ValidationError(msg) => (
            StatusCode::BAD_REQUEST,
            "ERR_VALIDATION_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::DefinitionParsingError(msg) => (
            StatusCode::BAD_REQUEST,
            "ERR_DEFINITION_PARSING".to_string(),
            msg.clone(),
        ),
        ServerError::StateStoreError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_STATE_STORE_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::ConfigError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_CONFIG_ERROR".to_string(),
            msg.clone(),
        ),
        ServerError::InternalError(msg) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "ERR_INTERNAL_SERVER_ERROR".to_string(),
            msg.clone(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status = |err: CoreError| ApiError::from(err).into_response().status();

        assert_eq!(status(CoreError::TaskNotFound("t".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(CoreError::InstanceNotFound("i".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(CoreError::TaskAlreadyCompleted("t".into())), StatusCode::CONFLICT);
        assert_eq!(status(CoreError::ValidationError("v".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(CoreError::StateStoreError("s".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::BadRequest("missing jobNumber".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
