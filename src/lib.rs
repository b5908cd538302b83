//! Media Server - resource-management core of a local media server
//!
//! A bounded metadata cache with TTL and LRU eviction, a bounded worker
//! pool for directory work, HTTP range streaming through pooled buffers and
//! a periodic metrics sampler.

pub mod api;
pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod library;
pub mod metrics;
pub mod models;
pub mod pool;
pub mod server;
pub mod stream;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use server::serve_with_drain;
pub use tasks::{spawn_metrics_task, spawn_sweep_task, BackgroundTasks};
