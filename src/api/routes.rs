//! API Routes
//!
//! Configures the Axum router with the streaming endpoint and the JSON API.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_cache_handler, health_handler, info_handler, invalidate_handler, list_handler,
    list_root_handler, metrics_handler, stream_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET|HEAD|OPTIONS /stream/{path}` - Range streaming of a media file
/// - `GET /api/list` and `GET /api/list/{path}` - Directory listing
/// - `GET /api/info/{path}` - File or directory metadata
/// - `POST /api/cache/invalidate` - Drop cached records of one path
/// - `DELETE /api/cache` - Clear the metadata cache
/// - `GET /api/metrics` - Latest metrics snapshot
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin on the JSON API; the stream endpoint sets its
///   own CORS headers
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/api/list", get(list_root_handler))
        .route("/api/list/*path", get(list_handler))
        .route("/api/info/*path", get(info_handler))
        .route("/api/cache/invalidate", post(invalidate_handler))
        .route("/api/cache", delete(clear_cache_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(cors);

    // GET routes answer HEAD as well
    Router::new()
        .route("/stream/*path", get(stream_handler).options(stream_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
