use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Domain errors raised by the gateway and the backing-store client.
///
/// Every variant carries a human-readable detail; the variant itself is the
/// machine-checkable kind. Listing calls are retried before one of these
/// surfaces; transfer and delete failures surface immediately.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("store authorization failed: {0}")]
    Auth(String),
    /// `status` is the observed upstream status, or 0 when no response was
    /// received at all.
    #[error("remote fetch failed with status {status}: {detail}")]
    Fetch { status: u16, detail: String },
    #[error("upload rejected by store: {0}")]
    Transfer(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("folder delete incomplete, {} object(s) failed: {}", .failed.len(), .failed.join(", "))]
    PartialDelete { failed: Vec<String> },
    #[error("store call failed: {0}")]
    Store(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Auth(_)
            | GatewayError::Fetch { .. }
            | GatewayError::Transfer(_)
            | GatewayError::PartialDelete { .. }
            | GatewayError::Store(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}
