// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[must_use]
    pub fn resource_not_found(resource: &str) -> Self {
        Self::not_found(format!("{resource} not found"))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Interactive-endpoint mapping of core errors: configuration and state
/// problems surface as 4xx, media-server failures as 502, the rest as 500.
/// Automation endpoints (webhooks, genre applies) bypass this and answer
/// 200-with-body instead.
impl From<nexroll_core::Error> for AppError {
    fn from(err: nexroll_core::Error) -> Self {
        use nexroll_core::Error;
        match &err {
            Error::NotFound(m) => Self::not_found(m.clone()),
            Error::AlreadyExists(m) => Self::conflict(m.clone()),
            Error::InvalidInput(m) => Self::bad_request(m.clone()),
            Error::Config(m) => Self::bad_request(m.clone()),
            Error::State(m) => Self::unprocessable(m.clone()),
            Error::Conflict(m) => Self::conflict(m.clone()),
            Error::Server(e) => Self::bad_gateway(format!("media server error ({}): {e}", e.kind())),
            Error::Database(_) | Error::Serialization(_) | Error::Internal(_) => {
                Self::internal(err.to_string())
            }
        }
    }
}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            status: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}
