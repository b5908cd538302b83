//! Buffer pooling for file copy loops.
//!
//! Streams borrow a fixed-size buffer for the lifetime of a response and
//! hand it back when they finish. Buffers are reused opportunistically and a
//! new one is allocated whenever none are idle, so the number of live
//! buffers is unbounded; [`BufferPool::trim`] is the only backstop.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

/// Size of every pooled buffer (64 KiB).
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Default)]
struct PoolState {
    idle: Vec<Vec<u8>>,
    in_use: usize,
    allocated: u64,
}

/// Pool of reusable fixed-size byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    state: Mutex<PoolState>,
    buffer_size: usize,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub buffer_size: usize,
    /// Buffers waiting for reuse
    pub idle: usize,
    /// Buffers currently lent out
    pub in_use: usize,
    /// Buffers allocated over the pool's lifetime
    pub allocated: u64,
}

impl BufferPoolStats {
    /// Bytes held by idle plus lent buffers.
    pub fn resident_bytes(&self) -> usize {
        (self.idle + self.in_use) * self.buffer_size
    }
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState::default()),
            buffer_size,
        })
    }

    /// Pool of [`STREAM_BUFFER_SIZE`] buffers.
    pub fn with_default_size() -> Arc<Self> {
        Self::new(STREAM_BUFFER_SIZE)
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Takes an idle buffer or allocates a fresh one. The buffer is
    /// `buffer_size` bytes long and goes back to the pool when dropped.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let reused = {
            let mut state = self.lock();
            state.in_use += 1;
            let reused = state.idle.pop();
            if reused.is_none() {
                state.allocated += 1;
            }
            reused
        };

        let data = reused.unwrap_or_else(|| vec![0u8; self.buffer_size]);
        PooledBuffer {
            data: Some(data),
            pool: Arc::clone(self),
        }
    }

    /// Returns a buffer early. Equivalent to dropping it.
    pub fn release(&self, buffer: PooledBuffer) {
        drop(buffer);
    }

    /// Drops idle buffers above `max_idle`, returning how many were freed.
    pub fn trim(&self, max_idle: usize) -> usize {
        let mut state = self.lock();
        let excess = state.idle.len().saturating_sub(max_idle);
        state.idle.truncate(max_idle);
        state.idle.shrink_to_fit();
        excess
    }

    pub fn stats(&self) -> BufferPoolStats {
        let state = self.lock();
        BufferPoolStats {
            buffer_size: self.buffer_size,
            idle: state.idle.len(),
            in_use: state.in_use,
            allocated: state.allocated,
        }
    }

    fn give_back(&self, buf: Vec<u8>) {
        let mut state = self.lock();
        state.in_use = state.in_use.saturating_sub(1);
        // Foreign-sized buffers are dropped rather than pooled
        if buf.len() == self.buffer_size {
            state.idle.push(buf);
        }
    }

    /// The pool state stays consistent across a panic, so a poisoned lock
    /// is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Buffer lent out by a [`BufferPool`]; returns itself on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    data: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.data.take() {
            self.pool.give_back(buf);
        }
    }
}
