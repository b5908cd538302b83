//! Request DTOs for the JSON API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Longest path accepted in a request body.
const MAX_PATH_LENGTH: usize = 4096;

/// Request body for POST /api/cache/invalidate
///
/// An empty path addresses the media root.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub path: String,
}

impl InvalidateRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.path.len() > MAX_PATH_LENGTH {
            return Some(format!(
                "Path exceeds maximum length of {} characters",
                MAX_PATH_LENGTH
            ));
        }
        if self.path.contains('\0') {
            return Some("Path cannot contain NUL bytes".to_string());
        }
        None
    }
}
