//! OrderedHashMap: insertion-ordered map over an OrderedList and a HashIndex.
//!
//! Entries (key, value, cached hash) live in list nodes; the list order is
//! the iteration order. The index maps each entry's hash to its list
//! [`Position`] and never owns the entry. Every mutation keeps the two in
//! step: inserts push the node first and register it second (rolling the node
//! back if registration fails); erases unregister first and unlink second.
//!
//! Growth: if an insert pushes the load factor over the maximum, the index
//! is rehashed to `growth_factor * len / max_load_factor` buckets. The new
//! slot array is allocated before the node and installed only once the entry
//! is linked and registered, so a failed or panicking insert leaves both the
//! entries and the bucket count untouched.

use crate::error::{handle_alloc_error, Error, Result};
use crate::hash_index::HashIndex;
use crate::ordered_list::{self, OrderedList, Position};
use crate::pooled_alloc::FreshAllocator;
use allocator_api2::alloc::{Allocator, Global};
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::Equivalent;
use std::collections::hash_map::RandomState;

pub const DEFAULT_BUCKET_COUNT: usize = 16;
pub const DEFAULT_MAX_LOAD_FACTOR: f32 = 0.8;
pub const DEFAULT_GROWTH_FACTOR: f32 = 2.0;

/// Which allocator a copied map draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyPolicy {
    /// The copy gets an independent allocator of the same kind.
    #[default]
    FreshAllocator,
    /// The copy shares the source's allocator (and so its pool).
    SharePool,
}

/// Construction parameters for [`OrderedHashMap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapConfig {
    /// Initial number of index buckets.
    pub bucket_count: usize,
    /// Load factor above which an insertion grows the index.
    pub max_load_factor: f32,
    /// Multiplier applied to the minimal bucket count when growing.
    pub growth_factor: f32,
    pub copy_policy: CopyPolicy,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            copy_policy: CopyPolicy::FreshAllocator,
        }
    }
}

impl MapConfig {
    #[must_use]
    pub fn with_bucket_count(mut self, n: usize) -> Self {
        self.bucket_count = n;
        self
    }

    #[must_use]
    pub fn with_max_load_factor(mut self, f: f32) -> Self {
        self.max_load_factor = f;
        self
    }

    #[must_use]
    pub fn with_growth_factor(mut self, f: f32) -> Self {
        self.growth_factor = f;
        self
    }

    #[must_use]
    pub fn with_copy_policy(mut self, p: CopyPolicy) -> Self {
        self.copy_policy = p;
        self
    }

    fn validated(self) -> Self {
        assert_valid_load_factor(self.max_load_factor);
        assert!(
            self.growth_factor.is_finite() && self.growth_factor > 1.0,
            "growth factor must be finite and greater than 1"
        );
        self
    }
}

fn assert_valid_load_factor(f: f32) {
    assert!(
        f.is_finite() && f > 0.0,
        "max load factor must be finite and positive"
    );
}

struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

pub struct OrderedHashMap<K, V, S = RandomState, A: Allocator = Global> {
    // Declared before `entries`: index entries are released before the nodes
    // they refer to.
    index: HashIndex<Position, A>,
    entries: OrderedList<Entry<K, V>, A>,
    hasher: S,
    config: MapConfig,
}

impl<K, V> OrderedHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }

    pub fn with_config(config: MapConfig) -> Self {
        Self::with_config_hasher_in(config, RandomState::new(), Global)
    }
}

impl<K, V> Default for OrderedHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> OrderedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config_hasher_in(MapConfig::default(), hasher, Global)
    }
}

impl<K, V, A> OrderedHashMap<K, V, RandomState, A>
where
    K: Eq + Hash,
    A: Allocator + Clone,
{
    pub fn new_in(alloc: A) -> Self {
        Self::with_config_hasher_in(MapConfig::default(), RandomState::new(), alloc)
    }
}

impl<K, V, S, A> OrderedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: Allocator + Clone,
{
    /// Map with the given configuration, hasher and allocator. Fails only if
    /// the initial bucket array cannot be allocated.
    pub fn try_with_config_hasher_in(config: MapConfig, hasher: S, alloc: A) -> Result<Self> {
        let config = config.validated();
        Ok(Self {
            index: HashIndex::new_in(config.bucket_count, alloc.clone())?,
            entries: OrderedList::new_in(alloc),
            hasher,
            config,
        })
    }

    pub fn with_config_hasher_in(config: MapConfig, hasher: S, alloc: A) -> Self {
        Self::try_with_config_hasher_in(config, hasher, alloc).unwrap_or_else(|e| handle_alloc_error(e))
    }

    pub fn with_hasher_in(hasher: S, alloc: A) -> Self {
        Self::with_config_hasher_in(MapConfig::default(), hasher, alloc)
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn locate<Q>(&self, hash: u64, q: &Q) -> Option<Position>
    where
        Q: ?Sized + Equivalent<K>,
    {
        let entries = &self.entries;
        self.index.find(hash, |pos| {
            entries
                .get(pos)
                .map(|e| q.equivalent(&e.key))
                .unwrap_or(false)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn allocator(&self) -> &A {
        self.entries.allocator()
    }

    pub fn config(&self) -> MapConfig {
        self.config
    }

    /// Position of `q`'s entry, or `None` (the end) if absent.
    pub fn find<Q>(&self, q: &Q) -> Option<Position>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let hash = self.make_hash(q);
        self.locate(hash, q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let pos = self.find(q)?;
        self.entries.get(pos).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let pos = self.find(q)?;
        self.entries.get_mut(pos).map(|e| &mut e.value)
    }

    /// Like [`get`](Self::get), but a missing key is an error.
    pub fn at<Q>(&self, q: &Q) -> Result<&V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.get(q).ok_or(Error::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.get_mut(q).ok_or(Error::KeyNotFound)
    }

    // Bucket count the index must grow to before holding one more entry.
    fn growth_target(&self) -> Option<usize> {
        let next = self.len() + 1;
        let buckets = self.bucket_count();
        if next as f32 / buckets as f32 <= self.config.max_load_factor {
            return None;
        }
        let target =
            (self.config.growth_factor * next as f32 / self.config.max_load_factor).ceil() as usize;
        Some(target.max(buckets + 1))
    }

    fn push_entry<F>(&mut self, hash: u64, key: K, make_value: F) -> Result<Position>
    where
        F: FnOnce() -> V,
    {
        let staged = match self.growth_target() {
            Some(n) => Some(self.index.prepare_rehash(n)?),
            None => None,
        };
        let pos = self.entries.push_back_with(|| Entry {
            key,
            value: make_value(),
            hash,
        })?;
        if let Err(e) = self.index.insert(hash, pos) {
            let _ = self.entries.erase(pos);
            return Err(e);
        }
        if let Some(staged) = staged {
            self.index.finish_rehash(staged);
        }
        Ok(pos)
    }

    /// Value for `key`, inserting `f()` at the back if absent.
    pub fn get_or_insert_with<F>(&mut self, key: K, f: F) -> Result<&mut V>
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let pos = match self.locate(hash, &key) {
            Some(pos) => pos,
            None => self.push_entry(hash, key, f)?,
        };
        self.entries
            .get_mut(pos)
            .map(|e| &mut e.value)
            .ok_or(Error::InvalidPosition)
    }

    /// Value for `key`, inserting `V::default()` at the back if absent.
    pub fn get_or_insert_default(&mut self, key: K) -> Result<&mut V>
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Insert `(key, value)` if `key` is absent. Returns the entry's position
    /// and whether an insertion happened; an existing entry is left untouched.
    pub fn insert(&mut self, key: K, value: V) -> Result<(Position, bool)> {
        self.insert_with(key, || value)
    }

    /// Like [`insert`](Self::insert), but builds the value only when inserting.
    pub fn insert_with<F>(&mut self, key: K, f: F) -> Result<(Position, bool)>
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        if let Some(pos) = self.locate(hash, &key) {
            return Ok((pos, false));
        }
        let pos = self.push_entry(hash, key, f)?;
        Ok((pos, true))
    }

    /// Insert, or overwrite the value of an existing entry in place (its
    /// position in the iteration order is kept).
    pub fn insert_or_assign(&mut self, key: K, value: V) -> Result<(Position, bool)> {
        let hash = self.make_hash(&key);
        if let Some(pos) = self.locate(hash, &key) {
            if let Some(e) = self.entries.get_mut(pos) {
                e.value = value;
            }
            return Ok((pos, false));
        }
        let pos = self.push_entry(hash, key, || value)?;
        Ok((pos, true))
    }

    /// Remove the entry at `pos`. Fails with `InvalidPosition` for erased or
    /// foreign positions, leaving the map unchanged.
    pub fn erase(&mut self, pos: Position) -> Result<(K, V)> {
        let hash = self.entries.get(pos).ok_or(Error::InvalidPosition)?.hash;
        self.index
            .erase(hash, |p| p == pos)
            .ok_or(Error::InvalidPosition)?;
        let e = self.entries.erase(pos)?;
        Ok((e.key, e.value))
    }

    /// Remove `[first, last)` in iteration order (`last == None` means to the
    /// end). The range is validated before anything is removed.
    pub fn erase_range(&mut self, first: Position, last: Option<Position>) -> Result<usize> {
        let mut doomed = Vec::new();
        let mut cur = Some(first);
        while let Some(p) = cur {
            if Some(p) == last {
                break;
            }
            cur = self.entries.next_position(p)?;
            doomed.push(p);
        }
        if cur != last {
            return Err(Error::InvalidPosition);
        }
        for p in &doomed {
            self.erase(*p)?;
        }
        Ok(doomed.len())
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let pos = self.find(q)?;
        self.erase(pos).ok()
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn entry_at(&self, pos: Position) -> Result<(&K, &V)> {
        self.entries
            .get(pos)
            .map(|e| (&e.key, &e.value))
            .ok_or(Error::InvalidPosition)
    }

    pub fn value_at_mut(&mut self, pos: Position) -> Result<&mut V> {
        self.entries
            .get_mut(pos)
            .map(|e| &mut e.value)
            .ok_or(Error::InvalidPosition)
    }

    pub fn first_position(&self) -> Option<Position> {
        self.entries.front_position()
    }

    pub fn last_position(&self) -> Option<Position> {
        self.entries.back_position()
    }

    pub fn next_position(&self, pos: Position) -> Result<Option<Position>> {
        self.entries.next_position(pos)
    }

    pub fn prev_position(&self, pos: Position) -> Result<Option<Position>> {
        self.entries.prev_position(pos)
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.entries.front().map(|e| (&e.key, &e.value))
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.entries.back().map(|e| (&e.key, &e.value))
    }

    pub fn bucket_count(&self) -> usize {
        self.index.bucket_count()
    }

    pub fn load_factor(&self) -> f32 {
        self.len() as f32 / self.bucket_count() as f32
    }

    pub fn max_load_factor(&self) -> f32 {
        self.config.max_load_factor
    }

    /// Panics unless `f` is finite and positive. Takes effect at the next insertion.
    pub fn set_max_load_factor(&mut self, f: f32) {
        assert_valid_load_factor(f);
        self.config.max_load_factor = f;
    }

    /// Rebuild the index with `n` buckets, but only if that grows the table
    /// and keeps the load factor within the maximum; otherwise do nothing.
    pub fn rehash(&mut self, n: usize) -> Result<()> {
        if n <= self.bucket_count() || self.len() as f32 / n as f32 > self.config.max_load_factor
        {
            return Ok(());
        }
        self.index.rehash(n)
    }

    /// Make room for `count` entries without exceeding the maximum load factor.
    pub fn reserve(&mut self, count: usize) -> Result<()> {
        let n = (count as f32 / self.config.max_load_factor).ceil() as usize;
        self.rehash(n)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, A> {
        IterMut {
            inner: self.entries.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V, A> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V, A> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V, A> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Entry positions in iteration order.
    pub fn positions(&self) -> Positions<'_, K, V, A> {
        Positions {
            inner: self.entries.positions(),
        }
    }

    /// Move the entries out. `self` is left empty with its own handle to the
    /// same allocator; positions follow the moved entries.
    pub fn take(&mut self) -> Result<Self>
    where
        S: Clone,
    {
        let alloc = self.allocator().clone();
        let empty = Self {
            index: HashIndex::new_in(self.config.bucket_count, alloc.clone())?,
            entries: OrderedList::new_in(alloc),
            hasher: self.hasher.clone(),
            config: self.config,
        };
        Ok(core::mem::replace(self, empty))
    }

    /// Deep copy honouring the configured [`CopyPolicy`].
    pub fn try_clone(&self) -> Result<Self>
    where
        K: Clone,
        V: Clone,
        S: Clone,
        A: FreshAllocator,
    {
        let alloc = match self.config.copy_policy {
            CopyPolicy::FreshAllocator => self.allocator().fresh(),
            CopyPolicy::SharePool => self.allocator().clone(),
        };
        let mut out = Self {
            index: HashIndex::new_in(self.bucket_count(), alloc.clone())?,
            entries: OrderedList::new_in(alloc),
            hasher: self.hasher.clone(),
            config: self.config,
        };
        for e in self.entries.iter() {
            let pos = out.entries.push_back_with(|| Entry {
                key: e.key.clone(),
                value: e.value.clone(),
                hash: e.hash,
            })?;
            out.index.insert(e.hash, pos)?;
        }
        Ok(out)
    }
}

impl<K, V, S, A> Clone for OrderedHashMap<K, V, S, A>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
    A: FreshAllocator,
{
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|e| handle_alloc_error(e))
    }
}

impl<K, V, S, A> fmt::Debug for OrderedHashMap<K, V, S, A>
where
    K: Eq + Hash + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
    A: Allocator + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, A> Extend<(K, V)> for OrderedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: Allocator + Clone,
{
    /// Inserts pairs whose key is absent; existing entries are kept.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            if let Err(e) = self.insert(k, v) {
                handle_alloc_error(e);
            }
        }
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedHashMap<K, V>
where
    K: Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedHashMap::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S, A> IntoIterator for &'a OrderedHashMap<K, V, S, A>
where
    K: Eq + Hash,
    S: BuildHasher,
    A: Allocator + Clone,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over entries in insertion order.
pub struct Iter<'a, K, V, A: Allocator = Global> {
    inner: ordered_list::Iter<'a, Entry<K, V>, A>,
}

impl<'a, K, V, A: Allocator> Clone for Iter<'a, K, V, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, K, V, A: Allocator> Iterator for Iter<'a, K, V, A> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, A: Allocator> DoubleEndedIterator for Iter<'a, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|e| (&e.key, &e.value))
    }
}

impl<'a, K, V, A: Allocator> ExactSizeIterator for Iter<'a, K, V, A> {}

/// Iterator over entries with mutable values, in insertion order.
pub struct IterMut<'a, K, V, A: Allocator = Global> {
    inner: ordered_list::IterMut<'a, Entry<K, V>, A>,
}

impl<'a, K, V, A: Allocator> Iterator for IterMut<'a, K, V, A> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (&e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V, A: Allocator> DoubleEndedIterator for IterMut<'a, K, V, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|e| (&e.key, &mut e.value))
    }
}

impl<'a, K, V, A: Allocator> ExactSizeIterator for IterMut<'a, K, V, A> {}

pub struct Keys<'a, K, V, A: Allocator = Global> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K, V, A: Allocator> Iterator for Keys<'a, K, V, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct Values<'a, K, V, A: Allocator = Global> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K, V, A: Allocator> Iterator for Values<'a, K, V, A> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct ValuesMut<'a, K, V, A: Allocator = Global> {
    inner: IterMut<'a, K, V, A>,
}

impl<'a, K, V, A: Allocator> Iterator for ValuesMut<'a, K, V, A> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Entry positions in insertion order.
pub struct Positions<'a, K, V, A: Allocator = Global> {
    inner: ordered_list::Positions<'a, Entry<K, V>, A>,
}

impl<'a, K, V, A: Allocator> Iterator for Positions<'a, K, V, A> {
    type Item = Position;

    fn next(&mut self) -> Option<Position> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
