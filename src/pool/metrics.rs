//! Worker pool bookkeeping and its point-in-time snapshot.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Counters owned by one pool, mutated under its state lock.
#[derive(Debug)]
pub(crate) struct PoolCounters {
    pub status: PoolStatus,
    pub active_tasks: usize,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub average_duration: Duration,
    pub last_task_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl PoolCounters {
    pub fn new() -> Self {
        Self {
            status: PoolStatus::Starting,
            active_tasks: 0,
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            average_duration: Duration::ZERO,
            last_task_at: None,
            stopped_at: None,
        }
    }

    /// Folds one finished task into the totals and the running average.
    pub fn record(&mut self, succeeded: bool, duration: Duration) {
        self.total_tasks += 1;
        if succeeded {
            self.successful_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }

        let n = self.total_tasks as f64;
        let avg = self.average_duration.as_secs_f64();
        self.average_duration =
            Duration::from_secs_f64(avg * (n - 1.0) / n + duration.as_secs_f64() / n);
        self.last_task_at = Some(Utc::now());
    }
}

/// Snapshot returned by [`crate::pool::WorkerPool::metrics`].
#[derive(Debug, Clone, Serialize)]
pub struct PoolMetrics {
    pub name: String,
    pub workers: usize,
    pub buffer_size: usize,
    /// Tasks waiting in the queue
    pub queue_depth: usize,
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    /// Percentage of finished tasks that succeeded
    pub success_rate: f64,
    pub average_task_duration_ms: f64,
    pub uptime_secs: u64,
    pub status: PoolStatus,
    pub started_at: DateTime<Utc>,
    pub last_task_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl PoolMetrics {
    pub fn failure_rate(&self) -> f64 {
        percent(self.failed_tasks as f64, self.total_tasks as f64)
    }

    /// Busy workers as a percentage of all workers.
    pub fn utilization(&self) -> f64 {
        percent(self.active_tasks as f64, self.workers as f64)
    }

    pub fn queue_utilization(&self) -> f64 {
        percent(self.queue_depth as f64, self.buffer_size as f64)
    }

    /// Running, queue not nearly full, and fewer than 10% of tasks failing.
    pub fn is_healthy(&self) -> bool {
        self.status == PoolStatus::Running
            && self.queue_utilization() < 95.0
            && self.failure_rate() < 10.0
    }
}

pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PoolMetrics {
        PoolMetrics {
            name: "test".into(),
            workers: 4,
            buffer_size: 100,
            queue_depth: 10,
            active_tasks: 2,
            idle_workers: 2,
            total_tasks: 20,
            successful_tasks: 19,
            failed_tasks: 1,
            success_rate: 95.0,
            average_task_duration_ms: 1.0,
            uptime_secs: 1,
            status: PoolStatus::Running,
            started_at: Utc::now(),
            last_task_at: None,
            stopped_at: None,
        }
    }

    #[test]
    fn test_running_average() {
        let mut counters = PoolCounters::new();
        counters.record(true, Duration::from_millis(10));
        counters.record(false, Duration::from_millis(30));

        assert_eq!(counters.total_tasks, 2);
        assert_eq!(counters.successful_tasks, 1);
        assert_eq!(counters.failed_tasks, 1);
        let avg_ms = counters.average_duration.as_secs_f64() * 1000.0;
        assert!((avg_ms - 20.0).abs() < 0.01, "avg was {}", avg_ms);
        assert!(counters.last_task_at.is_some());
    }

    #[test]
    fn test_derived_rates() {
        let metrics = sample();
        assert_eq!(metrics.failure_rate(), 5.0);
        assert_eq!(metrics.utilization(), 50.0);
        assert_eq!(metrics.queue_utilization(), 10.0);
        assert!(metrics.is_healthy());
    }

    #[test]
    fn test_unhealthy_when_stopping_or_failing() {
        let mut stopping = sample();
        stopping.status = PoolStatus::Stopping;
        assert!(!stopping.is_healthy());

        let mut failing = sample();
        failing.failed_tasks = 5;
        assert!(!failing.is_healthy());

        let mut backed_up = sample();
        backed_up.queue_depth = 96;
        assert!(!backed_up.is_healthy());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PoolStatus::Stopping).unwrap(),
            "\"stopping\""
        );
    }
}
