//! Error types for the media server
//!
//! `ServerError` covers everything that ends up as an HTTP status, `PoolError`
//! is the value handed back to components submitting work to a worker pool.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Server Error Enum ==
/// Unified error type for request handling.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Path does not resolve, escapes the media root, or the file is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Range header present but not parseable
    #[error("Malformed range: {0}")]
    MalformedRange(String),

    /// Parsed range lies outside the file
    #[error("Range not satisfiable for file of {size} bytes")]
    UnsatisfiableRange { size: u64 },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Open/seek/read failure after validation
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::UnsatisfiableRange { size } => {
                return (
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    [(header::CONTENT_RANGE, format!("bytes */{}", size))],
                )
                    .into_response();
            }
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::MalformedRange(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Io(err) => {
                tracing::error!("Request failed with I/O error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// == Pool Error Enum ==
/// Errors returned to callers submitting work to a [`crate::pool::WorkerPool`].
#[derive(Error, Debug)]
pub enum PoolError {
    /// The task queue is at capacity; the caller decides whether to retry
    #[error("worker pool queue is full")]
    Full,

    /// The pool no longer accepts or delivers work
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// The caller's cancellation token fired first
    #[error("task was cancelled")]
    Cancelled,

    /// The task ran and returned an error (or panicked)
    #[error("task failed: {0}")]
    TaskFailed(anyhow::Error),
}

// == Result Type Alias ==
/// Convenience Result type for request handling.
pub type Result<T> = std::result::Result<T, ServerError>;
