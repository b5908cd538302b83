//! API Handlers
//!
//! HTTP request handlers for the streaming endpoint and the JSON API.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use crate::buffer::BufferPool;
use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::library::{FileInfo, FsDirReader, MediaLibrary, MediaRoot, MetadataCache};
use crate::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::models::{
    ClearResponse, HealthResponse, InvalidateRequest, InvalidateResponse, ListingResponse,
};
use crate::pool::WorkerPool;
use crate::stream::{apply_cors_headers, apply_stream_headers, MediaStreamer, StreamStats};

/// Name of the pool that builds directory listings.
pub const FILE_POOL_NAME: &str = "file-operations";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Metadata cache shared with the library and the sweep task
    pub cache: MetadataCache,
    pub pool: Arc<WorkerPool>,
    pub buffers: Arc<BufferPool>,
    pub library: Arc<MediaLibrary>,
    pub streamer: MediaStreamer,
    pub metrics: Arc<MetricsAggregator>,
}

impl AppState {
    /// Builds every component from configuration and starts the worker
    /// pool. `config.media_dir` must exist.
    pub async fn from_config(config: &Config) -> std::io::Result<Self> {
        let root = Arc::new(MediaRoot::new(&config.media_dir)?);
        let cache = CacheStore::new(
            config.cache_max_entries,
            config.cache_max_memory,
            config.default_ttl(),
        )
        .into_shared();
        let pool = WorkerPool::with_shutdown_timeout(
            FILE_POOL_NAME,
            config.worker_count,
            config.worker_queue_size,
            config.shutdown_timeout(),
        );
        let buffers = BufferPool::with_default_size();
        let stream_stats = StreamStats::new();

        let library = Arc::new(MediaLibrary::new(
            root.clone(),
            Arc::new(FsDirReader),
            cache.clone(),
            Some(Arc::clone(&pool)),
            config.listing_ttl(),
        ));
        let streamer = MediaStreamer::new(root, Arc::clone(&buffers), Arc::clone(&stream_stats));
        let metrics = Arc::new(
            MetricsAggregator::new(
                cache.clone(),
                Arc::clone(&pool),
                Arc::clone(&buffers),
                stream_stats,
                config.buffer_pool_max_idle,
            )
            .await,
        );

        Ok(Self {
            config: Arc::new(config.clone()),
            cache,
            pool,
            buffers,
            library,
            streamer,
            metrics,
        })
    }
}

/// Handler for GET/HEAD/OPTIONS /stream/{path}
///
/// Errors carry the same CORS headers as successful responses so browser
/// players can read the status. Errors about an existing file also keep the
/// range and caching headers.
pub async fn stream_handler(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    match state.streamer.serve(&method, &path, &headers).await {
        Ok(response) => response,
        Err(err) => {
            let about_file = matches!(
                err,
                ServerError::MalformedRange(_)
                    | ServerError::UnsatisfiableRange { .. }
                    | ServerError::Io(_)
            );
            let mut response = err.into_response();
            if about_file {
                apply_stream_headers(response.headers_mut());
            } else {
                apply_cors_headers(response.headers_mut());
            }
            response
        }
    }
}

/// Handler for GET /api/list
pub async fn list_root_handler(State(state): State<AppState>) -> Result<Json<ListingResponse>> {
    list(&state, String::new()).await
}

/// Handler for GET /api/list/{path}
pub async fn list_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<ListingResponse>> {
    list(&state, path).await
}

async fn list(state: &AppState, path: String) -> Result<Json<ListingResponse>> {
    let entries = state.library.list_directory(&path).await?;
    Ok(Json(ListingResponse::new(
        crate::library::clean_relative(&path),
        entries,
    )))
}

/// Handler for GET /api/info/{path}
pub async fn info_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Json<Arc<FileInfo>>> {
    Ok(Json(state.library.file_info(&path).await?))
}

/// Handler for POST /api/cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ServerError::BadRequest(error_msg));
    }

    let removed = state.library.invalidate(&req.path).await;
    info!("Invalidated {} cache entries for '{}'", removed, req.path);
    Ok(Json(InvalidateResponse {
        path: req.path,
        removed,
    }))
}

/// Handler for DELETE /api/cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = {
        let mut cache = state.cache.write().await;
        let cleared = cache.len();
        cache.clear();
        cleared
    };
    info!("Cleared {} cache entries", cleared);
    Json(ClearResponse::new(cleared))
}

/// Handler for GET /api/metrics
///
/// Returns the snapshot published by the last sampler tick.
pub async fn metrics_handler(State(state): State<AppState>) -> Json<Arc<MetricsSnapshot>> {
    Json(state.metrics.latest())
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let pool = state.pool.metrics();
    Json(HealthResponse::from_pool(pool.is_healthy(), pool.status))
}
