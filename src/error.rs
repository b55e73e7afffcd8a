//! Error types for the request dispatcher
//!
//! Provides unified error handling using thiserror. The cache layer never
//! fails; every error here originates at dispatch time.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

// == Dispatch Error Enum ==
/// Failure categories surfaced by the dispatcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No route registered for (method, path)
    #[error("{method} {path} does not exist")]
    NotFound { method: String, path: String },

    /// Malformed request body or invalid parameters
    #[error("{0}")]
    BadInput(String),

    /// Unexpected failure while running a handler
    #[error("{0}")]
    Internal(String),

    /// Handler did not finish before the dispatch deadline
    #[error("handler did not complete within {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl DispatchError {
    /// Error kind string carried in the `error` field of the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "Not Found",
            DispatchError::BadInput(_) => "Bad Request",
            DispatchError::Internal(_) => "Internal Server Error",
            DispatchError::TimedOut(_) => "Gateway Timeout",
        }
    }

    /// Status code the transport should use for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::BadInput(_) => StatusCode::BAD_REQUEST,
            DispatchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DispatchError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Builds the `{error, message}` body for this error.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload::new(self.kind(), self.to_string())
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::BadInput(err.to_string())
    }
}

// == Error Payload ==
/// Error response body for all error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// Error kind, e.g. "Not Found"
    pub error: String,
    /// Human readable description
    pub message: String,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.payload())).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for handlers and dispatch.
pub type Result<T> = std::result::Result<T, DispatchError>;
