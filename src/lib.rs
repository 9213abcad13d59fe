//! pooled-ordered-map: an insertion-ordered hash map whose nodes can be drawn
//! from a shared chunked bump pool.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build OrderedHashMap from small layers with independent
//!   contracts, all parameterized over one untyped allocator.
//! - Layers:
//!   - ChunkPool / PooledAllocator: bump-carves small blocks from a chain
//!     of fixed-size chunks; deallocation of pooled memory is a no-op and
//!     the chain is released when the last handle drops.
//!   - OrderedList<T, A>: doubly-linked sequence with stable `Position`s;
//!     erase is O(1) and never disturbs other positions.
//!   - HashIndex<P, A>: separate-chaining table from cached hashes to
//!     copyable positions; it never owns or inspects elements.
//!   - OrderedHashMap<K, V, S, A>: entries live in an OrderedList and are
//!     found through a HashIndex; iteration order is insertion order.
//!
//! Constraints
//! - Single-threaded: the pool handle is `Rc`-shared (`!Send`/`!Sync`).
//! - Positions are generational keys tagged with their list's identity;
//!   stale or foreign positions are rejected with `InvalidPosition`.
//! - Unique keys; inserting an existing key keeps the original entry.
//!
//! Allocation failure
//! - Every fallible operation returns `Error::OutOfMemory` and leaves the
//!   structure as it was. Map inserts grow the index before linking the
//!   new node, and roll the node back if registering it fails.
//! - Trait impls that cannot report errors (`Clone`, `Extend`, the
//!   infallible constructors) abort through `handle_alloc_error`.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its `u64` hash; the index rehashes by stored hash
//!   alone, so `K: Hash` is never invoked after insertion.
//!
//! Notes and non-goals
//! - Rebinding an allocator to another element type is structural: the
//!   allocator trait is untyped, so one handle serves list nodes, index
//!   entries and the bucket array alike.
//! - The generational slot table behind OrderedList uses the global
//!   allocator; node payloads use the container's allocator.

pub mod chunk_pool;
pub mod error;
pub mod hash_index;
pub mod ordered_hash_map;
mod ordered_hash_map_proptest;
pub mod ordered_list;
pub mod pooled_alloc;
#[cfg(test)]
mod test_alloc;

// Public surface
pub use chunk_pool::{ChunkPool, PoolConfig};
pub use error::{Error, Result};
pub use hash_index::{HashIndex, StagedSlots};
pub use ordered_hash_map::{CopyPolicy, MapConfig, OrderedHashMap};
pub use ordered_list::{OrderedList, Position};
pub use pooled_alloc::{FreshAllocator, PooledAllocator};

pub use allocator_api2::alloc::{Allocator, Global};
pub use hashbrown::Equivalent;
