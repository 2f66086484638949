//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// API-surface errors.
///
/// Only request-level problems become HTTP errors; a mid-run failure is a
/// task record with `status=failed`, never a 5xx.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("System not initialized")]
    NotInitialized,

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}
