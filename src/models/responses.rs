//! Response DTOs for the JSON API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::sync::Arc;

use serde::Serialize;

use crate::library::FileInfo;
use crate::pool::PoolStatus;

/// Response body for GET /api/list and GET /api/list/{path}
#[derive(Debug, Clone, Serialize)]
pub struct ListingResponse {
    /// Listed directory, relative to the media root
    pub path: String,
    pub count: usize,
    pub entries: Arc<[FileInfo]>,
}

impl ListingResponse {
    pub fn new(path: impl Into<String>, entries: Arc<[FileInfo]>) -> Self {
        Self {
            path: path.into(),
            count: entries.len(),
            entries,
        }
    }
}

/// Response body for POST /api/cache/invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub path: String,
    /// Cache entries dropped (listing and/or file record)
    pub removed: usize,
}

/// Response body for DELETE /api/cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: format!("Cleared {} cache entries", cleared),
            cleared,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub worker_pool: PoolStatus,
}

impl HealthResponse {
    /// Healthy while the worker pool reports itself healthy.
    pub fn from_pool(pool_healthy: bool, worker_pool: PoolStatus) -> Self {
        Self {
            status: if pool_healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            worker_pool,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
