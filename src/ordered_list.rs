//! OrderedList: a doubly-linked list whose nodes live in a generational arena.
//!
//! Node payloads are boxed through the list's allocator; the arena
//! (`SlotMap`) only stores the boxes and hands out stable generational keys.
//! Links are keys rather than pointers and the list ends are `Option`s, so
//! there is no self-referential sentinel: "end" is `None`.
//!
//! A [`Position`] names one node of one list. It stays valid until that node
//! is erased, across any other insertions or erasures. Positions are tagged
//! with the owning list's id, so a position from another list, or one whose
//! node was erased, is rejected with [`Error::InvalidPosition`].

use crate::error::{handle_alloc_error, Error, Result};
use crate::pooled_alloc::FreshAllocator;
use allocator_api2::alloc::{Allocator, Global};
use allocator_api2::boxed::Box;
use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    struct NodeKey;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct ListId(u64);

impl ListId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ListId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Stable reference to one element of one [`OrderedList`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    list: ListId,
    key: NodeKey,
}

struct Node<T> {
    value: T,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
}

pub struct OrderedList<T, A: Allocator = Global> {
    id: ListId,
    nodes: SlotMap<NodeKey, Box<Node<T>, A>>,
    head: Option<NodeKey>,
    tail: Option<NodeKey>,
    alloc: A,
}

impl<T> OrderedList<T> {
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: Allocator + Clone> OrderedList<T, A> {
    /// Empty list drawing node memory from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            id: ListId::next(),
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
            alloc,
        }
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    fn position(&self, key: NodeKey) -> Position {
        Position { list: self.id, key }
    }

    #[inline]
    fn key_of(&self, pos: Position) -> Result<NodeKey> {
        if pos.list == self.id && self.nodes.contains_key(pos.key) {
            Ok(pos.key)
        } else {
            Err(Error::InvalidPosition)
        }
    }

    /// Whether `pos` names a live element of this list.
    pub fn contains(&self, pos: Position) -> bool {
        self.key_of(pos).is_ok()
    }

    // Node memory is reserved before `f` runs; if `f` panics the reservation
    // is released on unwind and the list is untouched.
    fn alloc_node<F>(&self, f: F) -> Result<Box<Node<T>, A>>
    where
        F: FnOnce() -> T,
    {
        let slot = Box::<Node<T>, A>::try_new_uninit_in(self.alloc.clone())
            .map_err(|_| Error::out_of_memory_for::<Node<T>>())?;
        let value = f();
        Ok(Box::write(
            slot,
            Node {
                value,
                prev: None,
                next: None,
            },
        ))
    }

    // Link `node` in front of `before` (or at the back when `None`).
    fn link(&mut self, node: Box<Node<T>, A>, before: Option<NodeKey>) -> NodeKey {
        let prev = match before {
            Some(b) => self.nodes[b].prev,
            None => self.tail,
        };
        let key = self.nodes.insert(node);
        {
            let n = &mut self.nodes[key];
            n.prev = prev;
            n.next = before;
        }
        match prev {
            Some(p) => self.nodes[p].next = Some(key),
            None => self.head = Some(key),
        }
        match before {
            Some(b) => self.nodes[b].prev = Some(key),
            None => self.tail = Some(key),
        }
        key
    }

    fn unlink(&mut self, key: NodeKey) -> Option<T> {
        let node = self.nodes.remove(key)?;
        match node.prev {
            Some(p) => self.nodes[p].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(n) => self.nodes[n].prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(Box::into_inner(node).value)
    }

    pub fn push_back(&mut self, value: T) -> Result<Position> {
        self.push_back_with(|| value)
    }

    /// Append an element built by `f` once node memory is secured.
    pub fn push_back_with<F>(&mut self, f: F) -> Result<Position>
    where
        F: FnOnce() -> T,
    {
        let node = self.alloc_node(f)?;
        let key = self.link(node, None);
        Ok(self.position(key))
    }

    pub fn push_front(&mut self, value: T) -> Result<Position> {
        self.push_front_with(|| value)
    }

    pub fn push_front_with<F>(&mut self, f: F) -> Result<Position>
    where
        F: FnOnce() -> T,
    {
        let node = self.alloc_node(f)?;
        let head = self.head;
        let key = self.link(node, head);
        Ok(self.position(key))
    }

    /// Insert `value` immediately before `pos`.
    pub fn insert_before(&mut self, pos: Position, value: T) -> Result<Position> {
        let before = self.key_of(pos)?;
        let node = self.alloc_node(|| value)?;
        let key = self.link(node, Some(before));
        Ok(self.position(key))
    }

    /// Unlink and return the element at `pos`. Other positions stay valid.
    pub fn erase(&mut self, pos: Position) -> Result<T> {
        let key = self.key_of(pos)?;
        self.unlink(key).ok_or(Error::InvalidPosition)
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let key = self.head?;
        self.unlink(key)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let key = self.tail?;
        self.unlink(key)
    }

    pub fn get(&self, pos: Position) -> Option<&T> {
        if pos.list != self.id {
            return None;
        }
        self.nodes.get(pos.key).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, pos: Position) -> Option<&mut T> {
        if pos.list != self.id {
            return None;
        }
        self.nodes.get_mut(pos.key).map(|n| &mut n.value)
    }

    pub fn front(&self) -> Option<&T> {
        self.head.and_then(|k| self.nodes.get(k)).map(|n| &n.value)
    }

    pub fn back(&self) -> Option<&T> {
        self.tail.and_then(|k| self.nodes.get(k)).map(|n| &n.value)
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        let k = self.head?;
        self.nodes.get_mut(k).map(|n| &mut n.value)
    }

    pub fn back_mut(&mut self) -> Option<&mut T> {
        let k = self.tail?;
        self.nodes.get_mut(k).map(|n| &mut n.value)
    }

    pub fn front_position(&self) -> Option<Position> {
        self.head.map(|k| self.position(k))
    }

    pub fn back_position(&self) -> Option<Position> {
        self.tail.map(|k| self.position(k))
    }

    /// Position following `pos`, or `None` at the end.
    pub fn next_position(&self, pos: Position) -> Result<Option<Position>> {
        let key = self.key_of(pos)?;
        Ok(self.nodes[key].next.map(|k| self.position(k)))
    }

    /// Position preceding `pos`, or `None` at the front.
    pub fn prev_position(&self, pos: Position) -> Result<Option<Position>> {
        let key = self.key_of(pos)?;
        Ok(self.nodes[key].prev.map(|k| self.position(k)))
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Shrink from the back or grow with values from `f` until `len() == n`.
    pub fn resize_with<F>(&mut self, n: usize, mut f: F) -> Result<()>
    where
        F: FnMut() -> T,
    {
        while self.len() > n {
            self.pop_back();
        }
        while self.len() < n {
            self.push_back_with(&mut f)?;
        }
        Ok(())
    }

    pub fn resize(&mut self, n: usize) -> Result<()>
    where
        T: Default,
    {
        self.resize_with(n, T::default)
    }

    pub fn iter(&self) -> Iter<'_, T, A> {
        Iter { raw: self.raw_iter() }
    }

    /// Mutable iteration in list order. Walks the links lazily.
    pub fn iter_mut(&mut self) -> IterMut<'_, T, A> {
        IterMut {
            remaining: self.nodes.len(),
            front: self.head,
            back: self.tail,
            nodes: NonNull::from(&mut self.nodes),
            _marker: PhantomData,
        }
    }

    /// Positions of all elements in list order.
    pub fn positions(&self) -> Positions<'_, T, A> {
        Positions {
            raw: self.raw_iter(),
            list: self.id,
        }
    }

    fn raw_iter(&self) -> RawIter<'_, T, A> {
        RawIter {
            nodes: &self.nodes,
            front: self.head,
            back: self.tail,
            remaining: self.nodes.len(),
        }
    }

    /// Deep copy into fresh nodes drawn from `alloc`, preserving order.
    pub fn try_clone_in<B>(&self, alloc: B) -> Result<OrderedList<T, B>>
    where
        T: Clone,
        B: Allocator + Clone,
    {
        let mut out = OrderedList::new_in(alloc);
        for v in self.iter() {
            out.push_back_with(|| v.clone())?;
        }
        Ok(out)
    }

    /// Move the contents out, leaving `self` empty with its own handle to the
    /// same allocator. Positions follow the moved elements.
    pub fn take(&mut self) -> Self {
        let empty = Self::new_in(self.alloc.clone());
        core::mem::replace(self, empty)
    }
}

impl<T: Clone, A: FreshAllocator> Clone for OrderedList<T, A> {
    fn clone(&self) -> Self {
        self.try_clone_in(self.alloc.fresh())
            .unwrap_or_else(|e| handle_alloc_error(e))
    }
}

impl<T: fmt::Debug, A: Allocator + Clone> fmt::Debug for OrderedList<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, A, B> PartialEq<OrderedList<T, B>> for OrderedList<T, A>
where
    T: PartialEq,
    A: Allocator + Clone,
    B: Allocator + Clone,
{
    fn eq(&self, other: &OrderedList<T, B>) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq, A: Allocator + Clone> Eq for OrderedList<T, A> {}

impl<T, A: Allocator + Clone> Extend<T> for OrderedList<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            if let Err(e) = self.push_back(v) {
                handle_alloc_error(e);
            }
        }
    }
}

impl<T> FromIterator<T> for OrderedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = OrderedList::new();
        list.extend(iter);
        list
    }
}

impl<'a, T, A: Allocator + Clone> IntoIterator for &'a OrderedList<T, A> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, A>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, A: Allocator + Clone> IntoIterator for OrderedList<T, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter { list: self }
    }
}

struct RawIter<'a, T, A: Allocator> {
    nodes: &'a SlotMap<NodeKey, Box<Node<T>, A>>,
    front: Option<NodeKey>,
    back: Option<NodeKey>,
    remaining: usize,
}

impl<'a, T, A: Allocator> Clone for RawIter<'a, T, A> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<'a, T, A: Allocator> Iterator for RawIter<'a, T, A> {
    type Item = (NodeKey, &'a Node<T>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.front?;
        let node = self.nodes.get(key)?;
        self.front = node.next;
        self.remaining -= 1;
        Some((key, &**node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T, A: Allocator> DoubleEndedIterator for RawIter<'a, T, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.back?;
        let node = self.nodes.get(key)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((key, &**node))
    }
}

/// Borrowing iterator in list order; clone it to restart from the same point.
pub struct Iter<'a, T, A: Allocator = Global> {
    raw: RawIter<'a, T, A>,
}

impl<'a, T, A: Allocator> Clone for Iter<'a, T, A> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
        }
    }
}

impl<'a, T, A: Allocator> Iterator for Iter<'a, T, A> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.raw.next().map(|(_, n)| &n.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<'a, T, A: Allocator> DoubleEndedIterator for Iter<'a, T, A> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.raw.next_back().map(|(_, n)| &n.value)
    }
}

impl<'a, T, A: Allocator> ExactSizeIterator for Iter<'a, T, A> {}
impl<'a, T, A: Allocator> FusedIterator for Iter<'a, T, A> {}

/// Mutable iterator in list order.
pub struct IterMut<'a, T, A: Allocator = Global> {
    nodes: NonNull<SlotMap<NodeKey, Box<Node<T>, A>>>,
    front: Option<NodeKey>,
    back: Option<NodeKey>,
    remaining: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T, A: Allocator> IterMut<'a, T, A> {
    fn node(&mut self, key: NodeKey) -> Option<&'a mut Node<T>> {
        // SAFETY: the list is mutably borrowed for 'a and not otherwise
        // reachable. Front and back walk toward each other and stop after
        // `remaining` steps, so every key is handed out at most once. Node
        // payloads are separate boxed allocations, so the short-lived map
        // borrow here never covers a node already yielded.
        unsafe {
            let nodes = &mut *self.nodes.as_ptr();
            let node: *mut Node<T> = &mut **nodes.get_mut(key)?;
            Some(&mut *node)
        }
    }
}

impl<'a, T, A: Allocator> Iterator for IterMut<'a, T, A> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.node(self.front?)?;
        self.front = node.next;
        self.remaining -= 1;
        Some(&mut node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T, A: Allocator> DoubleEndedIterator for IterMut<'a, T, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.node(self.back?)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some(&mut node.value)
    }
}

impl<'a, T, A: Allocator> ExactSizeIterator for IterMut<'a, T, A> {}
impl<'a, T, A: Allocator> FusedIterator for IterMut<'a, T, A> {}

/// Iterator over element positions in list order.
pub struct Positions<'a, T, A: Allocator = Global> {
    raw: RawIter<'a, T, A>,
    list: ListId,
}

impl<'a, T, A: Allocator> Iterator for Positions<'a, T, A> {
    type Item = Position;

    fn next(&mut self) -> Option<Self::Item> {
        let list = self.list;
        self.raw.next().map(|(key, _)| Position { list, key })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.raw.size_hint()
    }
}

impl<'a, T, A: Allocator> DoubleEndedIterator for Positions<'a, T, A> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let list = self.list;
        self.raw.next_back().map(|(key, _)| Position { list, key })
    }
}

/// Owning iterator; pops from the front.
pub struct IntoIter<T, A: Allocator + Clone = Global> {
    list: OrderedList<T, A>,
}

impl<T, A: Allocator + Clone> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.list.len(), Some(self.list.len()))
    }
}

impl<T, A: Allocator + Clone> DoubleEndedIterator for IntoIter<T, A> {
    fn next_back(&mut self) -> Option<T> {
        self.list.pop_back()
    }
}

impl<T, A: Allocator + Clone> ExactSizeIterator for IntoIter<T, A> {}
