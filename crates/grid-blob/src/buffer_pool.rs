//! Size-keyed pool of tile transfer buffers.
//!
//! Reads and read-modify-write cycles move one tile at a time through a
//! scratch buffer. Instead of allocating a fresh `Vec` per tile, buffers are
//! kept in a shared pool keyed by their exact length and handed back when
//! the [`PooledBuffer`] guard drops.
//!
//! ## Usage
//!
//! ```ignore
//! let pool = BufferPool::new(8);
//! let mut buf = pool.acquire(meta.bytes_per_tile());
//! reader.read_tile_bytes(col, row, &mut buf)?;
//! // buffer returns to the pool here
//! ```
//!
//! Buffers are handed out with stale contents; every caller overwrites the
//! whole buffer before reading from it.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::types::PoolStats;

/// Thread-safe pool of byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    max_per_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BufferPool {
    /// Create a pool retaining at most `max_per_size` idle buffers of each
    /// length.
    pub fn new(max_per_size: usize) -> Self {
        Self {
            free: Mutex::new(HashMap::new()),
            max_per_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Take a buffer of exactly `size` bytes.
    pub fn acquire(&self, size: usize) -> PooledBuffer<'_> {
        let reused = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.get_mut(&size).and_then(Vec::pop));

        let buf = match reused {
            Some(buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                vec![0; size]
            }
        };

        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn release(&self, buf: Vec<u8>) {
        if self.max_per_size == 0 {
            return;
        }
        if let Ok(mut free) = self.free.lock() {
            let slot = free.entry(buf.len()).or_default();
            if slot.len() < self.max_per_size {
                slot.push(buf);
            }
        }
    }

    /// Current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let (pooled_buffers, pooled_bytes) = self
            .free
            .lock()
            .map(|free| {
                free.iter()
                    .fold((0, 0), |(n, bytes), (size, bufs)| (n + bufs.len(), bytes + size * bufs.len()))
            })
            .unwrap_or_default();

        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            pooled_buffers,
            pooled_bytes,
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8)
    }
}

/// A buffer on loan from a [`BufferPool`]. Returned to the pool on drop.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<Vec<u8>>,
}

impl PooledBuffer<'_> {
    /// Take ownership of the bytes; they will not return to the pool.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
