//! Worker Pool Module
//!
//! Bounded queue plus a fixed set of workers for blocking filesystem work.

mod metrics;
mod worker_pool;

pub use metrics::{PoolMetrics, PoolStatus};
pub use worker_pool::{TaskFn, WorkerPool, DEFAULT_SHUTDOWN_TIMEOUT};
