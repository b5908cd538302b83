//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Cache Counters ==
/// Cumulative counters owned by a single store and mutated under its lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheCounters {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Entries removed by capacity eviction, sweep expiry or memory pressure
    pub evictions: u64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    // == Hit Rate ==
    /// Hit rate as a percentage, 0.0 when no lookups have happened.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

// == Cache Stats ==
/// Point-in-time snapshot of a cache, safe to hand to observers.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Entry-count cap
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups that hit
    pub hit_rate: f64,
    pub evictions: u64,
    pub default_ttl_secs: u64,
    /// Estimated bytes held by live entries
    pub memory_usage: usize,
    /// Soft memory cap enforced by the sweep
    pub max_memory: usize,
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_new() {
        let counters = CacheCounters::new();
        assert_eq!(counters.hits, 0);
        assert_eq!(counters.misses, 0);
        assert_eq!(counters.evictions, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheCounters::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let mut counters = CacheCounters::new();
        counters.record_hit();
        counters.record_hit();
        assert_eq!(counters.hit_rate(), 100.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut counters = CacheCounters::new();
        counters.record_hit();
        counters.record_miss();
        counters.record_miss();
        counters.record_hit();
        assert_eq!(counters.hit_rate(), 50.0);
    }

    #[test]
    fn test_record_evictions() {
        let mut counters = CacheCounters::new();
        counters.record_evictions(1);
        counters.record_evictions(3);
        assert_eq!(counters.evictions, 4);
    }
}
