//! ChunkPool: bump allocation out of a newest-first chain of fixed-size chunks.
//!
//! Requests are carved from the head chunk by advancing its cursor. When the
//! head cannot fit a request, a new chunk is allocated and linked in front of
//! it; the old head is never bumped again. Individual allocations are never
//! reclaimed, the whole chain is released when the pool drops.

use crate::error::{Error, Result};
use core::alloc::Layout;
use core::ptr::NonNull;

/// Default capacity of a single chunk in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Alignment of every chunk's base address. Requests asking for more are
/// not served from the pool.
pub const CHUNK_ALIGN: usize = 16;

/// Configuration for a [`ChunkPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Capacity of each chunk in bytes.
    pub chunk_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl PoolConfig {
    /// Config with the given chunk capacity. Panics if `chunk_size` is zero.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self { chunk_size }
    }

    /// Requests strictly larger than this bypass the pool.
    #[inline]
    pub fn large_request_threshold(&self) -> usize {
        self.chunk_size / 2
    }

    /// Whether `layout` is carved from a chunk (as opposed to the system).
    #[inline]
    pub fn serves(&self, layout: Layout) -> bool {
        layout.size() != 0
            && layout.size() <= self.large_request_threshold()
            && layout.align() <= CHUNK_ALIGN
    }
}

struct Chunk {
    ptr: NonNull<u8>,
    capacity: usize,
    cursor: usize,
    prev: Option<Box<Chunk>>,
}

impl Chunk {
    fn layout(capacity: usize) -> Result<Layout> {
        Layout::from_size_align(capacity, CHUNK_ALIGN).map_err(|_| Error::OutOfMemory {
            size: capacity,
            align: CHUNK_ALIGN,
        })
    }

    fn new(capacity: usize) -> Result<Self> {
        let layout = Self::layout(capacity)?;
        // SAFETY: capacity is non-zero (checked by PoolConfig).
        let raw = unsafe { std::alloc::alloc(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| Error::out_of_memory(layout))?;
        Ok(Self {
            ptr,
            capacity,
            cursor: 0,
            prev: None,
        })
    }

    fn remaining(&self) -> usize {
        self.capacity - self.cursor
    }

    /// Carve `layout` from the free tail of this chunk, if it fits.
    fn bump(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        let base = self.ptr.as_ptr() as usize;
        let unaligned = base.checked_add(self.cursor)?;
        let aligned = unaligned.checked_add(layout.align() - 1)? & !(layout.align() - 1);
        let start = aligned - base;
        let end = start.checked_add(layout.size())?;
        if end > self.capacity {
            return None;
        }
        self.cursor = end;
        // SAFETY: start < end <= capacity, so the offset stays inside the chunk.
        Some(unsafe { NonNull::new_unchecked(self.ptr.as_ptr().add(start)) })
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // Layout was valid when the chunk was created.
        if let Ok(layout) = Self::layout(self.capacity) {
            // SAFETY: ptr came from `alloc` with this exact layout.
            unsafe { std::alloc::dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

/// A bump allocator over a chain of chunks.
pub struct ChunkPool {
    config: PoolConfig,
    head: Option<Box<Chunk>>,
    chunks: usize,
    bytes_carved: usize,
}

impl ChunkPool {
    /// Empty pool; the first chunk is allocated lazily.
    pub fn new(config: PoolConfig) -> Self {
        assert!(config.chunk_size > 0, "chunk size must be non-zero");
        Self {
            config,
            head: None,
            chunks: 0,
            bytes_carved: 0,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Number of chunks currently linked in the chain.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// Total bytes handed out, including alignment padding.
    pub fn bytes_carved(&self) -> usize {
        self.bytes_carved
    }

    /// Free bytes left in the head chunk.
    pub fn head_remaining(&self) -> usize {
        self.head.as_ref().map_or(0, |c| c.remaining())
    }

    /// Carve `layout` from the head chunk, linking a new chunk first if the
    /// head is exhausted. A failed chunk allocation leaves the chain as it was.
    ///
    /// `layout` must satisfy [`PoolConfig::serves`].
    pub fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>> {
        debug_assert!(self.config.serves(layout), "request must fit the pool");
        if let Some(head) = self.head.as_mut() {
            let before = head.cursor;
            if let Some(ptr) = head.bump(layout) {
                self.bytes_carved += head.cursor - before;
                return Ok(ptr);
            }
        }

        let mut chunk = Box::new(Chunk::new(self.config.chunk_size)?);
        let ptr = chunk.bump(layout).ok_or_else(|| Error::out_of_memory(layout))?;
        self.bytes_carved += chunk.cursor;
        chunk.prev = self.head.take();
        self.head = Some(chunk);
        self.chunks += 1;
        tracing::debug!(
            chunks = self.chunks,
            chunk_size = self.config.chunk_size,
            "chunk pool linked a new chunk"
        );
        Ok(ptr)
    }
}

impl Drop for ChunkPool {
    fn drop(&mut self) {
        // Unlink iteratively so long chains do not recurse.
        let mut cur = self.head.take();
        while let Some(mut chunk) = cur {
            cur = chunk.prev.take();
        }
    }
}

impl core::fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChunkPool")
            .field("chunk_size", &self.config.chunk_size)
            .field("chunks", &self.chunks)
            .field("bytes_carved", &self.bytes_carved)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(size: usize, align: usize) -> Layout {
        Layout::from_size_align(size, align).unwrap()
    }

    /// Invariant: consecutive requests are carved from one chunk until it is full.
    #[test]
    fn bumps_within_one_chunk() {
        let mut pool = ChunkPool::new(PoolConfig::with_chunk_size(256));
        assert_eq!(pool.chunk_count(), 0);
        let a = pool.allocate(small(16, 8)).unwrap();
        let b = pool.allocate(small(16, 8)).unwrap();
        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 16);
        assert_eq!(pool.bytes_carved(), 32);
        assert_eq!(pool.head_remaining(), 256 - 32);
    }

    /// Invariant: an exhausted head is replaced by a new chunk and never bumped again.
    #[test]
    fn grows_by_linking_new_chunk() {
        let mut pool = ChunkPool::new(PoolConfig::with_chunk_size(64));
        for _ in 0..2 {
            pool.allocate(small(32, 8)).unwrap();
        }
        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(pool.head_remaining(), 0);
        pool.allocate(small(8, 8)).unwrap();
        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.head_remaining(), 56);
    }

    /// Invariant: returned pointers honour the requested alignment and cursor never
    /// exceeds capacity.
    #[test]
    fn respects_alignment() {
        let mut pool = ChunkPool::new(PoolConfig::with_chunk_size(128));
        pool.allocate(small(1, 1)).unwrap();
        let p = pool.allocate(small(8, 8)).unwrap();
        assert_eq!(p.as_ptr() as usize % 8, 0);
        let q = pool.allocate(small(16, 16)).unwrap();
        assert_eq!(q.as_ptr() as usize % 16, 0);
        assert!(pool.head_remaining() <= 128);
    }

    /// Invariant: the threshold is half the chunk size; zero-sized and over-aligned
    /// requests are not pool-served.
    #[test]
    fn serves_threshold() {
        let cfg = PoolConfig::with_chunk_size(4096);
        assert_eq!(cfg.large_request_threshold(), 2048);
        assert!(cfg.serves(small(2048, 8)));
        assert!(!cfg.serves(small(2049, 8)));
        assert!(!cfg.serves(small(0, 1)));
        assert!(!cfg.serves(small(8, 64)));
    }

    /// Invariant: dropping a pool with many chunks releases the whole chain.
    #[test]
    fn long_chain_drops() {
        let mut pool = ChunkPool::new(PoolConfig::with_chunk_size(32));
        for _ in 0..10_000 {
            pool.allocate(small(16, 8)).unwrap();
        }
        assert_eq!(pool.chunk_count(), 5_000);
        drop(pool);
    }
}
