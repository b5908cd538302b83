//! Mapping of request paths onto the media root.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::ServerError;

/// Turns a client-supplied relative path into a filesystem path.
///
/// Implementations must never return a path outside their root. Every
/// failure, traversal attempts included, is reported as
/// [`ServerError::NotFound`] so callers learn nothing about the layout
/// outside the root.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, request_path: &str) -> Result<PathBuf, ServerError>;
}

/// Resolver rooted at a canonical media directory.
#[derive(Debug, Clone)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    /// Canonicalizes `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PathResolver for MediaRoot {
    fn resolve(&self, request_path: &str) -> Result<PathBuf, ServerError> {
        let not_found = || ServerError::NotFound(format!("Path not found: {}", request_path));

        let relative = Path::new(request_path.trim_start_matches('/'));
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !plain {
            return Err(not_found());
        }

        // Symlinks may still point elsewhere, so check after canonicalizing
        let resolved = self.root.join(relative).canonicalize().map_err(|_| not_found())?;
        if !resolved.starts_with(&self.root) {
            tracing::warn!("Rejected path escaping media root: {}", request_path);
            return Err(not_found());
        }
        Ok(resolved)
    }
}

/// Normalized form of a request path used for cache keys and `FileInfo::path`:
/// no leading or trailing slash, no empty or `.` segments.
pub fn clean_relative(request_path: &str) -> String {
    request_path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
