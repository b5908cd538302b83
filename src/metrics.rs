//! Metrics Aggregator
//!
//! Samples the counters of every component into one immutable snapshot and
//! publishes it on a watch channel. Sampling reads each component in turn
//! and never holds two component locks at once.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::buffer::{BufferPool, BufferPoolStats};
use crate::cache::CacheStats;
use crate::library::MetadataCache;
use crate::pool::{PoolMetrics, WorkerPool};
use crate::stream::{StreamStats, StreamStatsSnapshot};

/// Process-level figures taken from the tokio runtime.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RuntimeMetrics {
    pub tokio_workers: usize,
    pub alive_tasks: usize,
    pub cpu_count: usize,
    pub uptime_secs: u64,
}

/// Everything the server reports at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cache: CacheStats,
    pub worker_pool: PoolMetrics,
    pub buffer_pool: BufferPoolStats,
    pub streams: StreamStatsSnapshot,
    pub runtime: RuntimeMetrics,
    /// Idle buffers released by the trim that preceded this sample
    pub trimmed_buffers: usize,
}

pub struct MetricsAggregator {
    cache: MetadataCache,
    pool: Arc<WorkerPool>,
    buffers: Arc<BufferPool>,
    streams: Arc<StreamStats>,
    max_idle_buffers: usize,
    started_at: Instant,
    tx: watch::Sender<Arc<MetricsSnapshot>>,
}

impl MetricsAggregator {
    /// Creates the aggregator and takes the first sample.
    pub async fn new(
        cache: MetadataCache,
        pool: Arc<WorkerPool>,
        buffers: Arc<BufferPool>,
        streams: Arc<StreamStats>,
        max_idle_buffers: usize,
    ) -> Self {
        let started_at = Instant::now();
        let first = collect(&cache, &pool, &buffers, &streams, started_at, 0).await;
        let (tx, _) = watch::channel(Arc::new(first));

        Self {
            cache,
            pool,
            buffers,
            streams,
            max_idle_buffers,
            started_at,
            tx,
        }
    }

    /// Trims the buffer pool, samples every component and publishes the
    /// result.
    pub async fn sample(&self) -> Arc<MetricsSnapshot> {
        let trimmed = self.buffers.trim(self.max_idle_buffers);
        if trimmed > 0 {
            debug!("Released {} idle stream buffers", trimmed);
        }

        let snapshot = Arc::new(
            collect(
                &self.cache,
                &self.pool,
                &self.buffers,
                &self.streams,
                self.started_at,
                trimmed,
            )
            .await,
        );
        self.tx.send_replace(Arc::clone(&snapshot));
        snapshot
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> Arc<MetricsSnapshot> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<MetricsSnapshot>> {
        self.tx.subscribe()
    }
}

async fn collect(
    cache: &MetadataCache,
    pool: &WorkerPool,
    buffers: &BufferPool,
    streams: &StreamStats,
    started_at: Instant,
    trimmed_buffers: usize,
) -> MetricsSnapshot {
    let cache = cache.read().await.stats();

    MetricsSnapshot {
        timestamp: Utc::now(),
        cache,
        worker_pool: pool.metrics(),
        buffer_pool: buffers.stats(),
        streams: streams.snapshot(),
        runtime: runtime_metrics(started_at),
        trimmed_buffers,
    }
}

fn runtime_metrics(started_at: Instant) -> RuntimeMetrics {
    let (tokio_workers, alive_tasks) = tokio::runtime::Handle::try_current()
        .map(|handle| {
            let metrics = handle.metrics();
            (metrics.num_workers(), metrics.num_alive_tasks())
        })
        .unwrap_or_default();

    RuntimeMetrics {
        tokio_workers,
        alive_tasks,
        cpu_count: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        uptime_secs: started_at.elapsed().as_secs(),
    }
}
