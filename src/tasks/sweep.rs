//! Cache Sweep Task
//!
//! Background task that periodically removes expired cache entries and,
//! when the memory estimate is over the cap, evicts down to the target.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::tasks::ticker;

/// Spawns a task running [`crate::cache::CacheStore::sweep`] every
/// `interval` until `shutdown` fires.
///
/// The first sweep happens one full interval after the call.
pub fn spawn_sweep_task<V>(
    cache: SharedCache<V>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting cache sweep task with interval of {:?}", interval);
        let mut ticker = ticker(interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let (report, stats) = {
                let mut cache = cache.write().await;
                let report = cache.sweep();
                (report, cache.stats())
            };

            if report.removed() > 0 {
                info!(
                    "Cache sweep: removed {} expired ({} bytes) and {} under memory pressure ({} bytes), {} entries left",
                    report.expired,
                    report.expired_bytes,
                    report.pressure_evicted,
                    report.pressure_bytes,
                    stats.size
                );
            } else {
                debug!("Cache sweep: nothing to remove");
            }
        }

        info!("Cache sweep task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;

    fn shared() -> SharedCache<String> {
        CacheStore::new(100, 1024 * 1024, Duration::from_secs(300)).into_shared()
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let cache = shared();
        cache.write().await.set_with_ttl(
            "expire_soon",
            "value".to_string(),
            Duration::from_millis(30),
        );

        let token = CancellationToken::new();
        let handle = spawn_sweep_task(cache.clone(), Duration::from_millis(50), token.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;

        {
            let cache = cache.read().await;
            assert!(!cache.contains_key("expire_soon"), "Expired entry should have been swept");
            // swept entries count as evictions, not misses
            assert_eq!(cache.stats().evictions, 1);
            assert_eq!(cache.stats().misses, 0);
        }

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_task_preserves_valid_entries() {
        let cache = shared();
        cache
            .write()
            .await
            .set("long_lived", "value".to_string());

        let token = CancellationToken::new();
        let handle = spawn_sweep_task(cache.clone(), Duration::from_millis(20), token.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            cache.write().await.get("long_lived"),
            Some("value".to_string())
        );

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_task_stops_on_cancel() {
        let token = CancellationToken::new();
        let handle = spawn_sweep_task(shared(), Duration::from_secs(3600), token.clone());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweep task should stop promptly")
            .unwrap();
    }
}
