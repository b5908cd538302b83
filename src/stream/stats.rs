//! Counters for in-flight and finished media streams.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Lock-free stream counters shared by every streaming response.
#[derive(Debug, Default)]
pub struct StreamStats {
    active_streams: AtomicU64,
    peak_streams: AtomicU64,
    total_streams: AtomicU64,
    bytes_streamed: AtomicU64,
    completed_streams: AtomicU64,
    failed_streams: AtomicU64,
    aborted_streams: AtomicU64,
}

/// Snapshot of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    pub active_streams: u64,
    pub peak_streams: u64,
    pub total_streams: u64,
    pub bytes_streamed: u64,
    /// Bodies copied to the end
    pub completed_streams: u64,
    /// Bodies cut short by a read error
    pub failed_streams: u64,
    /// Bodies dropped before the end, usually a client disconnect
    pub aborted_streams: u64,
}

impl StreamStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new body; the guard settles the counters when dropped.
    pub fn start(self: &Arc<Self>) -> StreamGuard {
        let active = self.active_streams.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_streams.fetch_max(active, Ordering::Relaxed);
        self.total_streams.fetch_add(1, Ordering::Relaxed);
        StreamGuard {
            stats: Arc::clone(self),
            outcome: Outcome::InFlight,
        }
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            active_streams: self.active_streams.load(Ordering::Relaxed),
            peak_streams: self.peak_streams.load(Ordering::Relaxed),
            total_streams: self.total_streams.load(Ordering::Relaxed),
            bytes_streamed: self.bytes_streamed.load(Ordering::Relaxed),
            completed_streams: self.completed_streams.load(Ordering::Relaxed),
            failed_streams: self.failed_streams.load(Ordering::Relaxed),
            aborted_streams: self.aborted_streams.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    InFlight,
    Completed,
    Failed,
}

/// Tracks one streaming body from first byte to drop.
#[derive(Debug)]
pub struct StreamGuard {
    stats: Arc<StreamStats>,
    outcome: Outcome,
}

impl StreamGuard {
    pub fn add_bytes(&self, n: u64) {
        self.stats.bytes_streamed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn complete(&mut self) {
        self.outcome = Outcome::Completed;
    }

    pub fn fail(&mut self) {
        self.outcome = Outcome::Failed;
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stats.active_streams.fetch_sub(1, Ordering::Relaxed);
        let counter = match self.outcome {
            Outcome::Completed => &self.stats.completed_streams,
            Outcome::Failed => &self.stats.failed_streams,
            Outcome::InFlight => &self.stats.aborted_streams,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
