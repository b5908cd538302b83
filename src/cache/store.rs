//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, TTL
//! expiration and approximate memory accounting.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::cache::size::{mem_size_estimator, MemSize, SizeEstimator, ENTRY_OVERHEAD};
use crate::cache::{CacheCounters, CacheEntry, CacheStats, LruTracker};

/// Store shared between request handlers and the background sweep.
///
/// Every operation, reads included, takes the write side: a hit mutates
/// access bookkeeping and an expired read deletes the entry.
pub type SharedCache<V> = Arc<RwLock<CacheStore<V>>>;

/// Fraction of `max_memory` aggressive cleanup shrinks usage down to.
const PRESSURE_TARGET_PERCENT: usize = 80;

// == Sweep Report ==
/// Outcome of one [`CacheStore::sweep`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired entries removed
    pub expired: usize,
    /// Estimated bytes released by expiry
    pub expired_bytes: usize,
    /// Live entries evicted because usage stayed above the memory cap
    pub pressure_evicted: usize,
    /// Estimated bytes released by pressure eviction
    pub pressure_bytes: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.pressure_evicted
    }
}

// == Cache Store ==
/// Bounded key-value store with per-entry TTL and LRU eviction.
///
/// The entry-count cap is enforced on every insert. The memory cap is only
/// enforced by [`CacheStore::sweep`], so usage can overshoot it between sweeps.
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Cumulative hit/miss/eviction counters
    counters: CacheCounters,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Soft memory cap in estimated bytes
    max_memory: usize,
    /// TTL applied by [`CacheStore::set`]
    default_ttl: Duration,
    /// Sum of the size estimates of live entries
    memory_usage: usize,
    estimator: SizeEstimator<V>,
    last_sweep: Option<Instant>,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a store sized by the values' own [`MemSize`] estimate.
    pub fn new(max_entries: usize, max_memory: usize, default_ttl: Duration) -> Self
    where
        V: MemSize + 'static,
    {
        Self::with_estimator(max_entries, max_memory, default_ttl, mem_size_estimator())
    }

    /// Creates a store with a custom size estimator.
    pub fn with_estimator(
        max_entries: usize,
        max_memory: usize,
        default_ttl: Duration,
        estimator: SizeEstimator<V>,
    ) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            counters: CacheCounters::new(),
            max_entries,
            max_memory,
            default_ttl,
            memory_usage: 0,
            estimator,
            last_sweep: None,
        }
    }

    /// Wraps the store for sharing across tasks.
    pub fn into_shared(self) -> SharedCache<V> {
        Arc::new(RwLock::new(self))
    }

    // == Set ==
    /// Stores a value under the default TTL.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        let ttl = self.default_ttl;
        self.set_with_ttl(key, value, ttl);
    }

    /// Stores a value with an explicit TTL.
    ///
    /// An existing entry for `key` is replaced. Inserting a new key into a
    /// full store evicts the least recently accessed entry first. A store
    /// built with `max_entries == 0` keeps nothing.
    pub fn set_with_ttl(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        if self.max_entries == 0 {
            return;
        }

        if let Some(old) = self.entries.remove(&key) {
            self.memory_usage = self.memory_usage.saturating_sub(old.size);
        } else if self.entries.len() >= self.max_entries {
            self.evict_lru();
        }

        let size = (self.estimator)(&value) + ENTRY_OVERHEAD;
        self.entries
            .insert(key.clone(), CacheEntry::new(value, ttl, size));
        self.lru.touch(&key);
        self.memory_usage += size;
    }

    // == Get ==
    /// Returns a clone of the value if present and not expired.
    ///
    /// Expired entries are deleted on the spot and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();

        let expired = match self.entries.get_mut(key) {
            None => {
                self.counters.record_miss();
                return None;
            }
            Some(entry) if entry.is_expired_at(now) => true,
            Some(entry) => {
                entry.record_access(now);
                false
            }
        };

        if expired {
            self.remove_entry(key);
            self.counters.record_miss();
            return None;
        }

        self.lru.touch(key);
        self.counters.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Invalidate ==
    /// Removes an entry by key. Returns whether it was present.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.remove_entry(key).is_some()
    }

    // == Clear ==
    /// Removes every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.memory_usage = 0;
    }

    // == Sweep ==
    /// Removes expired entries, then relieves memory pressure.
    ///
    /// When estimated usage still exceeds the memory cap after expiry, live
    /// entries are evicted oldest-access-first until usage drops to 80% of
    /// the cap.
    pub fn sweep(&mut self) -> SweepReport {
        let now = Instant::now();
        let mut report = SweepReport::default();

        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired_keys {
            if let Some(entry) = self.remove_entry(&key) {
                report.expired += 1;
                report.expired_bytes += entry.size;
            }
        }
        self.counters.record_evictions(report.expired as u64);

        if self.memory_usage > self.max_memory {
            let target = self.max_memory.saturating_mul(PRESSURE_TARGET_PERCENT) / 100;
            while self.memory_usage > target {
                let Some(size) = self.evict_lru() else {
                    break;
                };
                report.pressure_evicted += 1;
                report.pressure_bytes += size;
            }
        }

        self.last_sweep = Some(now);
        report
    }

    // == Tuning ==
    /// Changes the entry cap, evicting LRU entries down to it.
    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries;
        while self.entries.len() > self.max_entries {
            if self.evict_lru().is_none() {
                break;
            }
        }
    }

    /// Changes the TTL used by [`CacheStore::set`]. Existing entries keep theirs.
    pub fn set_default_ttl(&mut self, ttl: Duration) {
        self.default_ttl = ttl;
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Stats ==
    /// Returns a point-in-time statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_entries,
            hits: self.counters.hits,
            misses: self.counters.misses,
            hit_rate: self.counters.hit_rate(),
            evictions: self.counters.evictions,
            default_ttl_secs: self.default_ttl.as_secs(),
            memory_usage: self.memory_usage,
            max_memory: self.max_memory,
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    pub fn last_sweep(&self) -> Option<Instant> {
        self.last_sweep
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks presence without touching counters or recency. Expired but
    /// not yet removed entries count as present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    // == Internal Helpers ==
    /// Evicts the least recently accessed entry, returning its size.
    fn evict_lru(&mut self) -> Option<usize> {
        let key = self.lru.evict_oldest()?;
        let entry = self.entries.remove(&key)?;
        self.memory_usage = self.memory_usage.saturating_sub(entry.size);
        self.counters.record_evictions(1);
        Some(entry.size)
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.memory_usage = self.memory_usage.saturating_sub(entry.size);
        Some(entry)
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .field("memory_usage", &self.memory_usage)
            .field("max_memory", &self.max_memory)
            .field("default_ttl", &self.default_ttl)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
