//! PooledAllocator: a shared handle to one [`ChunkPool`].
//!
//! Cloning a handle shares the chunk chain; the chain is released when the
//! last handle (including the ones held inside container nodes) drops. Small
//! requests are bump-carved from the pool and their deallocation is a no-op.
//! Requests above half the chunk size, or over-aligned ones, go straight to
//! the system allocator and are freed eagerly.
//!
//! The handle implements the untyped `allocator_api2` `Allocator` trait, so
//! it serves any node type: a map's list nodes, index entries and slot array
//! can all draw from the same chain.

use crate::chunk_pool::{ChunkPool, PoolConfig};
use allocator_api2::alloc::{AllocError, Allocator, Global};
use core::alloc::Layout;
use core::cell::RefCell;
use core::ptr::NonNull;
use std::rc::Rc;

/// Allocators that can hand out an independent sibling.
///
/// Containers use this when a copy must not share memory with its source.
pub trait FreshAllocator: Allocator + Clone {
    /// A new allocator of the same kind and configuration sharing no state with `self`.
    fn fresh(&self) -> Self;
}

impl FreshAllocator for Global {
    fn fresh(&self) -> Self {
        Global
    }
}

#[derive(Clone)]
pub struct PooledAllocator {
    pool: Rc<RefCell<ChunkPool>>,
}

impl PooledAllocator {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            pool: Rc::new(RefCell::new(ChunkPool::new(config))),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.pool.borrow().config()
    }

    /// Chunks linked in the shared chain.
    pub fn chunk_count(&self) -> usize {
        self.pool.borrow().chunk_count()
    }

    /// Bytes carved from the shared chain so far.
    pub fn bytes_carved(&self) -> usize {
        self.pool.borrow().bytes_carved()
    }

    /// Number of live handles sharing the chain.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.pool)
    }

    #[inline]
    fn dangling(layout: Layout) -> NonNull<[u8]> {
        // Alignment is a non-zero power of two, which is a valid dangling address.
        let ptr = NonNull::new(layout.align() as *mut u8).unwrap_or(NonNull::dangling());
        NonNull::slice_from_raw_parts(ptr, 0)
    }
}

impl Default for PooledAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PooledAllocator {
    /// Handles are equal iff they share one chunk chain.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.pool, &other.pool)
    }
}

impl Eq for PooledAllocator {}

impl core::fmt::Debug for PooledAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PooledAllocator")
            .field("pool", &*self.pool.borrow())
            .field("handles", &self.handle_count())
            .finish()
    }
}

impl FreshAllocator for PooledAllocator {
    fn fresh(&self) -> Self {
        Self::with_config(self.config())
    }
}

// SAFETY: pool memory stays valid until the last handle drops, and every
// box or vector holding pool memory also holds a handle. System-served
// blocks are routed back to `Global` by the same `serves` predicate.
unsafe impl Allocator for PooledAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        if layout.size() == 0 {
            return Ok(Self::dangling(layout));
        }
        let mut pool = self.pool.borrow_mut();
        if !pool.config().serves(layout) {
            tracing::trace!(
                size = layout.size(),
                align = layout.align(),
                "oversized request served by the system allocator"
            );
            return Global.allocate(layout);
        }
        let ptr = pool.allocate(layout).map_err(|_| AllocError)?;
        Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        if !self.pool.borrow().config().serves(layout) {
            Global.deallocate(ptr, layout);
        }
        // Pool memory is reclaimed with the chain.
    }
}
