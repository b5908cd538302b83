//! API Module
//!
//! HTTP handlers and routing for the media server.
//!
//! # Endpoints
//! - `GET|HEAD|OPTIONS /stream/{path}` - Stream a media file, honoring `Range`
//! - `GET /api/list[/{path}]` - List a directory
//! - `GET /api/info/{path}` - File metadata
//! - `POST /api/cache/invalidate` - Invalidate one path
//! - `DELETE /api/cache` - Clear the metadata cache
//! - `GET /api/metrics` - Latest metrics snapshot
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
