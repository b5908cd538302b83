//! Range streaming for media files.
//!
//! Request flow: resolve the path, open and stat the file, pick whole-file
//! or ranged mode from the `Range` header, then hand the open file to a body
//! that copies the span through a pooled buffer.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tracing::{debug, error};

use crate::buffer::BufferPool;
use crate::error::{Result, ServerError};
use crate::library::PathResolver;
use crate::stream::body::file_body;
use crate::stream::media_type::content_type_for;
use crate::stream::range::RangeSpec;
use crate::stream::stats::StreamStats;

/// Serves byte ranges of files under a media root.
#[derive(Clone)]
pub struct MediaStreamer {
    resolver: Arc<dyn PathResolver>,
    buffers: Arc<BufferPool>,
    stats: Arc<StreamStats>,
}

impl MediaStreamer {
    pub fn new(
        resolver: Arc<dyn PathResolver>,
        buffers: Arc<BufferPool>,
        stats: Arc<StreamStats>,
    ) -> Self {
        Self {
            resolver,
            buffers,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<StreamStats> {
        &self.stats
    }

    /// Builds the response for one `GET`, `HEAD` or `OPTIONS` request.
    ///
    /// Errors are returned before any byte of the body is produced.
    pub async fn serve(
        &self,
        method: &Method,
        request_path: &str,
        request_headers: &HeaderMap,
    ) -> Result<Response> {
        if method == Method::OPTIONS {
            let mut headers = HeaderMap::new();
            apply_cors_headers(&mut headers);
            return Ok((StatusCode::OK, headers).into_response());
        }

        let path = self.resolve(request_path).await?;
        let file = open_media(&path, request_path).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(ServerError::NotFound(format!("Not a file: {}", request_path)));
        }
        let size = metadata.len();
        let mut headers = media_headers(&path);

        if method == Method::HEAD {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            return Ok((StatusCode::OK, headers).into_response());
        }

        let range = match request_headers.get(header::RANGE) {
            None => None,
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    ServerError::MalformedRange("Range header is not valid ASCII".to_string())
                })?;
                Some(RangeSpec::parse(raw)?.resolve(size)?)
            }
        };

        match range {
            None => {
                debug!("Streaming whole file {} ({} bytes)", path.display(), size);
                let body = self.body(file, &path, 0, size).await?;
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
                Ok((StatusCode::OK, headers, body).into_response())
            }
            Some(range) => {
                debug!(
                    "Streaming {} of {}",
                    range.content_range(size),
                    path.display()
                );
                let body = self.body(file, &path, range.start, range.len()).await?;
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.len()));
                Ok((
                    StatusCode::PARTIAL_CONTENT,
                    headers,
                    [(header::CONTENT_RANGE, range.content_range(size))],
                    body,
                )
                    .into_response())
            }
        }
    }

    /// Canonicalizing walks the filesystem, so it runs on the blocking pool.
    async fn resolve(&self, request_path: &str) -> Result<PathBuf> {
        let resolver = Arc::clone(&self.resolver);
        let request_path = request_path.to_string();
        tokio::task::spawn_blocking(move || resolver.resolve(&request_path))
            .await
            .map_err(|err| ServerError::Io(io::Error::other(err)))?
    }

    async fn body(&self, mut file: File, path: &Path, start: u64, len: u64) -> Result<Body> {
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await.map_err(|err| {
                error!("Failed to seek {} to {}: {}", path.display(), start, err);
                err
            })?;
        }

        Ok(file_body(
            file,
            len,
            self.buffers.acquire(),
            self.stats.start(),
            path.to_path_buf(),
        ))
    }
}

async fn open_media(path: &Path, request_path: &str) -> Result<File> {
    match File::open(path).await {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ServerError::NotFound(
            format!("File not found: {}", request_path),
        )),
        Err(err) => {
            error!("Failed to open {}: {}", path.display(), err);
            Err(err.into())
        }
    }
}

fn media_headers(path: &Path) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(path)),
    );
    apply_stream_headers(&mut headers);
    headers
}

/// Headers every response about an existing media file carries, range
/// errors included. Content-Type is left to the caller.
pub fn apply_stream_headers(headers: &mut HeaderMap) {
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_DISPOSITION, HeaderValue::from_static("inline"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    apply_cors_headers(headers);
}

/// CORS headers for the streaming endpoint, errors included.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Range, Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Length, Content-Range, Accept-Ranges"),
    );
}
