//! Background Tasks Module
//!
//! Periodic tasks that run for the lifetime of the server.
//!
//! # Tasks
//! - Cache sweep: removes expired entries and enforces the memory cap
//! - Metrics sampler: publishes snapshots and trims the buffer pool

mod metrics;
mod sweep;

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use metrics::spawn_metrics_task;
pub use sweep::spawn_sweep_task;

/// Shortest period a background task may run at.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Interval whose first tick is one period away.
pub(crate) fn ticker(period: Duration) -> Interval {
    let period = period.max(MIN_INTERVAL);
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Handles of the running background tasks plus the token that stops them.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    shutdown: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to pass to tasks spawned into this set.
    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn push(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.handles.push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancels every task and waits up to `timeout` in total for them to
    /// exit. Tasks still running after that are aborted.
    pub async fn shutdown(self, timeout: Duration) {
        self.shutdown.cancel();
        let deadline = Instant::now() + timeout;

        for (name, mut handle) in self.handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Background task '{}' ended abnormally: {}", name, err),
                Err(_) => {
                    warn!("Background task '{}' did not stop in time, aborting", name);
                    handle.abort();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_stops_cooperative_tasks() {
        let mut tasks = BackgroundTasks::new();
        let token = tasks.token();
        tasks.push(
            "waits",
            tokio::spawn(async move { token.cancelled().await }),
        );
        assert_eq!(tasks.len(), 1);

        tokio::time::timeout(Duration::from_secs(1), tasks.shutdown(Duration::from_secs(5)))
            .await
            .expect("shutdown should not need the full timeout");
    }

    #[tokio::test]
    async fn test_shutdown_aborts_stuck_tasks() {
        let mut tasks = BackgroundTasks::new();
        tasks.push(
            "stuck",
            tokio::spawn(async { std::future::pending::<()>().await }),
        );

        let started = std::time::Instant::now();
        tasks.shutdown(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_skips_immediate_tick() {
        let mut ticker = ticker(Duration::from_secs(10));
        let before = Instant::now();
        ticker.tick().await;
        assert!(Instant::now() - before >= Duration::from_secs(10));
    }
}
