//! Cache Module
//!
//! In-memory metadata cache with TTL expiration, LRU eviction on the entry
//! cap and an approximate memory cap enforced by the periodic sweep.

mod entry;
mod lru;
pub mod size;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use size::{MemSize, SizeEstimator, ENTRY_OVERHEAD};
pub use stats::{CacheCounters, CacheStats};
pub use store::{CacheStore, SharedCache, SweepReport};
