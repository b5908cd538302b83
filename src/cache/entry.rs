//! Cache Entry Module
//!
//! Defines a single cached record with its TTL deadline and access bookkeeping.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A cached value plus the metadata the store needs for expiry and eviction.
///
/// Entries are owned by the store. Readers only ever see clones of `value`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion time
    pub created_at: Instant,
    /// Absolute expiry deadline
    pub expires_at: Instant,
    /// Number of successful reads
    pub access_count: u64,
    /// Last insert or successful read
    pub last_accessed: Instant,
    /// Estimated footprint in bytes, fixed at insert time
    pub size: usize,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now.
    pub fn new(value: V, ttl: Duration, size: usize) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
            last_accessed: now,
            size,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches `expires_at`, so an
    /// entry with a zero TTL is never observable.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    // == Record Access ==
    /// Bumps the access counter and refreshes `last_accessed`.
    pub fn record_access(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_accessed = now;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("test_value".to_string(), Duration::from_secs(60), 74);

        assert_eq!(entry.value, "test_value");
        assert_eq!(entry.access_count, 0);
        assert_eq!(entry.size, 74);
        assert_eq!(entry.created_at, entry.last_accessed);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new("v", Duration::from_millis(50), 1);

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(80));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let entry = CacheEntry::new("v", Duration::ZERO, 1);
        assert!(entry.is_expired(), "Entry should be expired at boundary");
    }

    #[test]
    fn test_record_access() {
        let mut entry = CacheEntry::new(1u32, Duration::from_secs(10), 1);
        let later = entry.last_accessed + Duration::from_millis(5);

        entry.record_access(later);
        entry.record_access(later);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed, later);
    }
}
