//! Periodic metrics sampling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::MetricsAggregator;
use crate::tasks::ticker;

/// Spawns a task calling [`MetricsAggregator::sample`] every `interval`
/// until `shutdown` fires.
pub fn spawn_metrics_task(
    aggregator: Arc<MetricsAggregator>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting metrics sampler with interval of {:?}", interval);
        let mut ticker = ticker(interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = aggregator.sample().await;
            debug!(
                "Metrics: cache {}/{} entries, pool {} active {} queued, {} active streams",
                snapshot.cache.size,
                snapshot.cache.max_size,
                snapshot.worker_pool.active_tasks,
                snapshot.worker_pool.queue_depth,
                snapshot.streams.active_streams
            );
        }

        info!("Metrics sampler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::cache::CacheStore;
    use crate::pool::WorkerPool;
    use crate::stream::StreamStats;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_metrics_task_publishes_and_trims() {
        let buffers = BufferPool::new(16);
        drop((0..5).map(|_| buffers.acquire()).collect::<Vec<_>>());
        let pool = WorkerPool::new("metrics-task", 1, 4);

        let aggregator = Arc::new(
            MetricsAggregator::new(
                CacheStore::new(10, 4096, Duration::from_secs(60)).into_shared(),
                Arc::clone(&pool),
                Arc::clone(&buffers),
                StreamStats::new(),
                2,
            )
            .await,
        );
        let mut rx = aggregator.subscribe();

        let token = CancellationToken::new();
        let handle = spawn_metrics_task(
            Arc::clone(&aggregator),
            Duration::from_millis(20),
            token.clone(),
        );

        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("no snapshot published")
            .unwrap();
        assert_eq!(buffers.stats().idle, 2);

        token.cancel();
        handle.await.unwrap();
        pool.shutdown().await;
    }
}
