//! Approximate memory accounting for cached values.
//!
//! Sizes are heuristics (payload length plus a fixed overhead), not allocator
//! measurements. The memory cap built on them is a soft target.

use std::sync::Arc;

/// Fixed per-entry overhead charged on top of the value estimate.
pub const ENTRY_OVERHEAD: usize = 64;

/// Charged for values with no better estimate.
pub const UNKNOWN_VALUE_SIZE: usize = 256;

/// Function computing the estimated size of a value, excluding [`ENTRY_OVERHEAD`].
pub type SizeEstimator<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

/// Values that can estimate their own heap footprint.
pub trait MemSize {
    fn mem_size(&self) -> usize;
}

impl MemSize for String {
    fn mem_size(&self) -> usize {
        self.len()
    }
}

impl MemSize for str {
    fn mem_size(&self) -> usize {
        self.len()
    }
}

impl MemSize for Vec<u8> {
    fn mem_size(&self) -> usize {
        self.len()
    }
}

impl<T: MemSize> MemSize for [T] {
    fn mem_size(&self) -> usize {
        self.iter().map(MemSize::mem_size).sum()
    }
}

impl<T: MemSize + ?Sized> MemSize for Arc<T> {
    fn mem_size(&self) -> usize {
        (**self).mem_size()
    }
}

/// Estimator backed by the value's [`MemSize`] impl.
pub fn mem_size_estimator<V: MemSize + 'static>() -> SizeEstimator<V> {
    Arc::new(|value: &V| value.mem_size())
}

/// Estimator charging every value the same flat size.
pub fn flat_estimator<V: 'static>() -> SizeEstimator<V> {
    Arc::new(|_: &V| UNKNOWN_VALUE_SIZE)
}
