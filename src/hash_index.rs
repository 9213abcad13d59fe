//! HashIndex: separate-chaining table of position references.
//!
//! Each bucket holds a singly-linked chain of boxed entries; an entry stores
//! the element's cached `u64` hash and a copyable position reference into
//! some other container. The index never owns or inspects elements: lookups
//! take a predicate that resolves a candidate position and compares keys.
//! The cached hash rejects most candidates before the predicate runs, and
//! rehashing re-buckets entries by cached hash alone, relinking the existing
//! boxes without touching the referenced container.

use crate::error::{Error, Result};
use allocator_api2::alloc::{Allocator, Global};
use allocator_api2::boxed::Box;
use allocator_api2::vec::Vec;

struct IndexEntry<P, A: Allocator> {
    hash: u64,
    pos: P,
    next: Link<P, A>,
}

type Link<P, A> = Option<Box<IndexEntry<P, A>, A>>;

pub struct HashIndex<P, A: Allocator = Global> {
    slots: Vec<Link<P, A>, A>,
    len: usize,
    alloc: A,
}

#[inline]
fn bucket_of(hash: u64, buckets: usize) -> usize {
    (hash % buckets as u64) as usize
}

impl<P: Copy> HashIndex<P> {
    pub fn new(buckets: usize) -> Result<Self> {
        Self::new_in(buckets, Global)
    }
}

impl<P: Copy, A: Allocator + Clone> HashIndex<P, A> {
    /// Index with `buckets` empty chains (at least one).
    pub fn new_in(buckets: usize, alloc: A) -> Result<Self> {
        let slots = Self::empty_slots(buckets.max(1), &alloc)?;
        Ok(Self {
            slots,
            len: 0,
            alloc,
        })
    }

    fn empty_slots(buckets: usize, alloc: &A) -> Result<Vec<Link<P, A>, A>> {
        let mut slots = Vec::new_in(alloc.clone());
        slots.try_reserve_exact(buckets)?;
        slots.resize_with(buckets, || None);
        Ok(slots)
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn bucket_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of registered positions.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First position in `hash`'s chain whose cached hash matches and for
    /// which `eq` holds.
    pub fn find<F>(&self, hash: u64, mut eq: F) -> Option<P>
    where
        F: FnMut(P) -> bool,
    {
        let mut link = self.slots[bucket_of(hash, self.slots.len())].as_deref();
        while let Some(e) = link {
            if e.hash == hash && eq(e.pos) {
                return Some(e.pos);
            }
            link = e.next.as_deref();
        }
        None
    }

    /// Prepend `pos` to its bucket chain. Callers must have ruled out a
    /// duplicate with [`find`](Self::find). On failure nothing is linked.
    pub fn insert(&mut self, hash: u64, pos: P) -> Result<()> {
        let entry = IndexEntry {
            hash,
            pos,
            next: None,
        };
        let mut boxed = Box::try_new_in(entry, self.alloc.clone())
            .map_err(|_| Error::out_of_memory_for::<IndexEntry<P, A>>())?;
        let b = bucket_of(hash, self.slots.len());
        let slot = &mut self.slots[b];
        boxed.next = slot.take();
        *slot = Some(boxed);
        self.len += 1;
        Ok(())
    }

    /// Unlink and release the first entry matching `hash` and `eq`,
    /// returning its position.
    pub fn erase<F>(&mut self, hash: u64, mut eq: F) -> Option<P>
    where
        F: FnMut(P) -> bool,
    {
        let buckets = self.slots.len();
        let mut link = &mut self.slots[bucket_of(hash, buckets)];
        loop {
            let hit = match link.as_deref() {
                None => return None,
                Some(e) => e.hash == hash && eq(e.pos),
            };
            if hit {
                break;
            }
            link = &mut link.as_mut()?.next;
        }
        let mut removed = link.take()?;
        *link = removed.next.take();
        self.len -= 1;
        Some(removed.pos)
    }

    /// Replace the slot array with `new_size` buckets (at least one) and
    /// relink every entry by its cached hash. On allocation failure the index
    /// is left as it was.
    pub fn rehash(&mut self, new_size: usize) -> Result<()> {
        let staged = self.prepare_rehash(new_size)?;
        self.finish_rehash(staged);
        Ok(())
    }

    /// Allocate the slot array for a later [`finish_rehash`](Self::finish_rehash)
    /// without touching the index. Dropping the result releases it.
    pub fn prepare_rehash(&self, new_size: usize) -> Result<StagedSlots<P, A>> {
        let slots = Self::empty_slots(new_size.max(1), &self.alloc)?;
        Ok(StagedSlots { slots })
    }

    /// Relink every entry into `staged` by its cached hash and make it the
    /// slot array. Cannot fail.
    pub fn finish_rehash(&mut self, staged: StagedSlots<P, A>) {
        let mut slots = staged.slots;
        let new_size = slots.len();
        let from = self.slots.len();
        let old = core::mem::replace(&mut self.slots, Vec::new_in(self.alloc.clone()));
        for head in old {
            let mut cur = head;
            while let Some(mut e) = cur {
                cur = e.next.take();
                let slot = &mut slots[bucket_of(e.hash, new_size)];
                e.next = slot.take();
                *slot = Some(e);
            }
        }
        tracing::debug!(
            from,
            to = new_size,
            entries = self.len,
            "hash index rehashed"
        );
        self.slots = slots;
    }

    /// Drop every entry, keeping the current bucket count.
    pub fn clear(&mut self) {
        release_chains(&mut self.slots);
        self.len = 0;
    }

    /// Every registered position, bucket by bucket.
    pub fn positions(&self) -> impl Iterator<Item = P> + '_ {
        self.slots.iter().flat_map(|head| {
            let mut link = head.as_deref();
            core::iter::from_fn(move || {
                let e = link?;
                link = e.next.as_deref();
                Some(e.pos)
            })
        })
    }

    /// Length of the longest bucket chain.
    pub fn longest_chain(&self) -> usize {
        self.slots
            .iter()
            .map(|head| {
                let mut n = 0;
                let mut link = head.as_deref();
                while let Some(e) = link {
                    n += 1;
                    link = e.next.as_deref();
                }
                n
            })
            .max()
            .unwrap_or(0)
    }
}

/// An empty slot array allocated ahead of a rehash.
pub struct StagedSlots<P, A: Allocator = Global> {
    slots: Vec<Link<P, A>, A>,
}

impl<P, A: Allocator> StagedSlots<P, A> {
    pub fn bucket_count(&self) -> usize {
        self.slots.len()
    }
}

impl<P, A: Allocator> Drop for HashIndex<P, A> {
    fn drop(&mut self) {
        release_chains(&mut self.slots);
    }
}

// Unlink chains iteratively so long collision chains do not recurse on drop.
fn release_chains<P, A: Allocator>(slots: &mut [Link<P, A>]) {
    for slot in slots.iter_mut() {
        let mut cur = slot.take();
        while let Some(mut e) = cur {
            cur = e.next.take();
        }
    }
}

impl<P: Copy, A: Allocator + Clone> core::fmt::Debug for HashIndex<P, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashIndex")
            .field("len", &self.len)
            .field("buckets", &self.slots.len())
            .finish()
    }
}
