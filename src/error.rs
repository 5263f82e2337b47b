//! Common error types for the image edit serving layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Queue is full: {0}")]
    CapacityExceeded(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Variant not loaded: {0}")]
    NotLoaded(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Configuration defect: {0}")]
    ConfigurationError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Prompt rejected: {0}")]
    PromptBlocked(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "backend_error", None),
            AppError::CapacityExceeded(_) => (StatusCode::TOO_MANY_REQUESTS, "capacity_error", Some("queue_full")),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict_error", Some("pipeline_busy")),
            AppError::NotLoaded(_) => (StatusCode::CONFLICT, "conflict_error", Some("variant_not_loaded")),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout_error", None),
            AppError::Processing(_) => (StatusCode::BAD_GATEWAY, "backend_error", None),
            AppError::ConfigurationError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("not_configured")),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::PromptBlocked(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("prompt_blocked")),
            AppError::AuthenticationFailed(_) => (StatusCode::UNAUTHORIZED, "authentication_error", Some("invalid_api_key")),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
