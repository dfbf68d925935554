//! Concurrent doubly linked list with a list lock and one lock per node.
//!
//! Nodes live in a [`SlotArena`] and link to each other by [`SlotId`]. Every
//! arena slot is its own `parking_lot::RwLock`, so a node's value can be read
//! or rewritten while other threads traverse the list, and a structural change
//! only needs exclusive access to the nodes whose links it rewrites.
//!
//! ## Architecture
//!
//! ```text
//!   LinkedList<T>
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │ core: RwLock<ListCore<T>>                     (list lock)        │
//!   │   ends: { head, tail }                                           │
//!   │   arena: SlotArena<RwLock<Node<T>>>           (one lock per node)│
//!   │   ┌────────┬──────────────────────────────────────────────┐      │
//!   │   │ SlotId │ RwLock<Node { value, prev, next }>           │      │
//!   │   ├────────┼──────────────────────────────────────────────┤      │
//!   │   │ id_1   │ { value: A, prev: None,       next: id_2 }   │      │
//!   │   │ id_2   │ { value: B, prev: Some(id_1), next: id_3 }   │      │
//!   │   │ id_3   │ { value: C, prev: Some(id_2), next: None }   │      │
//!   │   └────────┴──────────────────────────────────────────────┘      │
//!   └──────────────────────────────────────────────────────────────────┘
//!
//!   head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail
//! ```
//!
//! ## Locking
//!
//! | Operation kind                       | List lock | Node locks                        |
//! |--------------------------------------|-----------|-----------------------------------|
//! | add / remove / unlink / move         | write     | target, then prev, then next      |
//! | find / contains / to_vec / for_each  | read      | read, one node at a time          |
//! | get_with / update_with / set_value   | read      | read or write on that node only   |
//!
//! Links (`prev`, `next`, `head`, `tail`) are only ever written while the list
//! write lock is held, and node locks are only ever taken after the list lock.
//! Structural changes acquire node locks exclusively through `Splice`, which
//! always locks the target before its neighbours, so no two operations can
//! wait on each other's nodes.
//!
//! ## Handles
//!
//! Inserts return a [`NodeRef`]. A handle is weak: it stays valid while its
//! node is linked, and becomes stale once the node is unlinked, popped or
//! cleared. Stale handles and handles issued by a different list are detected
//! (list id + slot generation) and never alias another node.
//!
//! ## Performance
//! - `add_first` / `add_last` / `add_before` / `add_after`: O(1)
//! - `remove_first` / `remove_last` / `unlink`: O(1)
//! - `to_first` / `to_last`: O(1)
//! - `find_*` / `contains` / `to_vec` / `for_each`: O(n)
//!
//! ## Example Usage
//!
//! ```
//! use lockweave::ds::LinkedList;
//!
//! let list = LinkedList::new();
//! let a = list.add_last("a");
//! list.add_last("b");
//! let c = list.add_last("c");
//!
//! assert!(list.to_first(c));
//! assert_eq!(list.to_vec(), vec!["c", "a", "b"]);
//!
//! assert_eq!(list.unlink(a), Some("a"));
//! assert_eq!(list.to_vec_rev(), vec!["b", "c"]);
//! assert!(list.add_after(a, "x").is_err());
//! ```
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockWriteGuard};
use rustc_hash::FxHashSet;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::{InvalidNodeError, InvariantError};

static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(0);

/// Weak handle to a node of a [`LinkedList`].
///
/// Only meaningful for the list that returned it, and only while the node is
/// still linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    list: u64,
    slot: SlotId,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

type NodeCell<T> = RwLock<Node<T>>;

#[derive(Debug, Default, Clone, Copy)]
struct Ends {
    head: Option<SlotId>,
    tail: Option<SlotId>,
}

#[derive(Debug)]
struct ListCore<T> {
    arena: SlotArena<NodeCell<T>>,
    ends: Ends,
}

/// Exclusive access to one node and its neighbours for a structural change.
///
/// Only built while the list write lock is held. Locks are taken target
/// first, then `prev`, then `next`.
struct Splice<'a, T> {
    target: RwLockWriteGuard<'a, Node<T>>,
    prev: Option<RwLockWriteGuard<'a, Node<T>>>,
    next: Option<RwLockWriteGuard<'a, Node<T>>>,
}

impl<'a, T> Splice<'a, T> {
    /// Locks `id` and the neighbours it is currently linked to.
    fn around(arena: &'a SlotArena<NodeCell<T>>, id: SlotId) -> Option<Self> {
        let target = arena.get(id)?.write();
        let (prev, next) = (target.prev, target.next);
        Some(Self::lock_neighbours(arena, target, prev, next))
    }

    /// Points `id` at `prev` and `next`, then locks those neighbours.
    fn between(
        arena: &'a SlotArena<NodeCell<T>>,
        id: SlotId,
        prev: Option<SlotId>,
        next: Option<SlotId>,
    ) -> Option<Self> {
        let mut target = arena.get(id)?.write();
        target.prev = prev;
        target.next = next;
        Some(Self::lock_neighbours(arena, target, prev, next))
    }

    fn lock_neighbours(
        arena: &'a SlotArena<NodeCell<T>>,
        target: RwLockWriteGuard<'a, Node<T>>,
        prev: Option<SlotId>,
        next: Option<SlotId>,
    ) -> Self {
        let prev = prev.and_then(|id| arena.get(id)).map(|cell| cell.write());
        let next = next.and_then(|id| arena.get(id)).map(|cell| cell.write());
        Self { target, prev, next }
    }

    /// Points the neighbours (or the list ends) back at `id`.
    fn link(mut self, id: SlotId, ends: &mut Ends) {
        match self.prev.as_mut() {
            Some(prev) => prev.next = Some(id),
            None => ends.head = Some(id),
        }
        match self.next.as_mut() {
            Some(next) => next.prev = Some(id),
            None => ends.tail = Some(id),
        }
    }

    /// Joins the neighbours to each other and clears the target's links.
    fn unlink(mut self, ends: &mut Ends) {
        let (prev_id, next_id) = (self.target.prev, self.target.next);
        match self.prev.as_mut() {
            Some(prev) => prev.next = next_id,
            None => ends.head = next_id,
        }
        match self.next.as_mut() {
            Some(next) => next.prev = prev_id,
            None => ends.tail = prev_id,
        }
        self.target.prev = None;
        self.target.next = None;
    }
}

impl<T> ListCore<T> {
    fn new(capacity: usize) -> Self {
        Self {
            arena: SlotArena::with_capacity(capacity),
            ends: Ends::default(),
        }
    }

    /// Allocates a node for `value` and links it between `prev` and `next`.
    fn splice_in(&mut self, value: T, prev: Option<SlotId>, next: Option<SlotId>) -> SlotId {
        let id = self.arena.insert(RwLock::new(Node { value, prev, next }));
        let ListCore { arena, ends } = self;
        if let Some(splice) = Splice::around(arena, id) {
            splice.link(id, ends);
        }
        id
    }

    /// Detaches `id` and frees its slot.
    fn take(&mut self, id: SlotId) -> Option<T> {
        {
            let ListCore { arena, ends } = &mut *self;
            Splice::around(arena, id)?.unlink(ends);
        }
        self.arena.remove(id).map(|cell| cell.into_inner().value)
    }

    /// Detaches `id` and reattaches it between `prev` and `next`.
    fn relink(&mut self, id: SlotId, at_front: bool) {
        let ListCore { arena, ends } = self;
        if let Some(splice) = Splice::around(arena, id) {
            splice.unlink(ends);
        }
        let (prev, next) = if at_front {
            (None, ends.head)
        } else {
            (ends.tail, None)
        };
        if let Some(splice) = Splice::between(arena, id, prev, next) {
            splice.link(id, ends);
        }
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.ends = Ends::default();
    }
}

/// Doubly linked list safe for concurrent use through `&self`.
pub struct LinkedList<T> {
    id: u64,
    core: RwLock<ListCore<T>>,
}

impl<T> LinkedList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with reserved node capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed),
            core: RwLock::new(ListCore::new(capacity)),
        }
    }

    fn handle(&self, slot: SlotId) -> NodeRef {
        NodeRef {
            list: self.id,
            slot,
        }
    }

    fn slot(&self, node: NodeRef) -> Option<SlotId> {
        (node.list == self.id).then_some(node.slot)
    }

    fn resolve(&self, core: &ListCore<T>, node: NodeRef) -> Result<SlotId, InvalidNodeError> {
        match self.slot(node) {
            Some(slot) if core.arena.contains(slot) => Ok(slot),
            Some(_) => Err(InvalidNodeError::new(
                "node handle is stale: the node is no longer linked",
            )),
            None => Err(InvalidNodeError::new(
                "node handle belongs to a different list",
            )),
        }
    }

    /// Returns the number of nodes in the list.
    pub fn len(&self) -> usize {
        self.core.read().arena.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.core.read().arena.is_empty()
    }

    /// Removes every node. All handles issued so far become stale.
    pub fn clear(&self) {
        self.core.write().clear();
    }

    /// Returns a handle to the first node.
    pub fn first(&self) -> Option<NodeRef> {
        self.core.read().ends.head.map(|slot| self.handle(slot))
    }

    /// Returns a handle to the last node.
    pub fn last(&self) -> Option<NodeRef> {
        self.core.read().ends.tail.map(|slot| self.handle(slot))
    }

    /// Returns `true` if `node` is currently linked into this list.
    pub fn contains_node(&self, node: NodeRef) -> bool {
        self.slot(node)
            .is_some_and(|slot| self.core.read().arena.contains(slot))
    }

    /// Returns the node after `node`.
    pub fn next(&self, node: NodeRef) -> Option<NodeRef> {
        let slot = self.slot(node)?;
        let core = self.core.read();
        let next = core.arena.get(slot)?.read().next?;
        Some(self.handle(next))
    }

    /// Returns the node before `node`.
    pub fn prev(&self, node: NodeRef) -> Option<NodeRef> {
        let slot = self.slot(node)?;
        let core = self.core.read();
        let prev = core.arena.get(slot)?.read().prev?;
        Some(self.handle(prev))
    }

    // -- ends ---------------------------------------------------------------

    /// Inserts `value` at the front and returns its handle.
    pub fn add_first(&self, value: T) -> NodeRef {
        let mut core = self.core.write();
        let head = core.ends.head;
        let slot = core.splice_in(value, None, head);
        self.handle(slot)
    }

    /// Inserts `value` at the back and returns its handle.
    pub fn add_last(&self, value: T) -> NodeRef {
        let mut core = self.core.write();
        let tail = core.ends.tail;
        let slot = core.splice_in(value, tail, None);
        self.handle(slot)
    }

    /// Removes and returns the front value.
    pub fn remove_first(&self) -> Option<T> {
        let mut core = self.core.write();
        let head = core.ends.head?;
        core.take(head)
    }

    /// Removes and returns the back value.
    pub fn remove_last(&self) -> Option<T> {
        let mut core = self.core.write();
        let tail = core.ends.tail?;
        core.take(tail)
    }

    /// Runs `f` on the front value.
    pub fn first_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let core = self.core.read();
        let head = core.ends.head?;
        let node = core.arena.get(head)?.read();
        Some(f(&node.value))
    }

    /// Runs `f` on the back value.
    pub fn last_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let core = self.core.read();
        let tail = core.ends.tail?;
        let node = core.arena.get(tail)?.read();
        Some(f(&node.value))
    }

    // -- arbitrary position -------------------------------------------------

    /// Inserts `value` directly after `existing`.
    ///
    /// Fails if `existing` is stale or belongs to another list; the list is
    /// left untouched in that case.
    pub fn add_after(&self, existing: NodeRef, value: T) -> Result<NodeRef, InvalidNodeError> {
        let mut core = self.core.write();
        let anchor = self.resolve(&core, existing)?;
        let next = core.arena.get(anchor).and_then(|cell| cell.read().next);
        let slot = core.splice_in(value, Some(anchor), next);
        Ok(self.handle(slot))
    }

    /// Inserts `value` directly before `existing`.
    ///
    /// Fails if `existing` is stale or belongs to another list; the list is
    /// left untouched in that case.
    pub fn add_before(&self, existing: NodeRef, value: T) -> Result<NodeRef, InvalidNodeError> {
        let mut core = self.core.write();
        let anchor = self.resolve(&core, existing)?;
        let prev = core.arena.get(anchor).and_then(|cell| cell.read().prev);
        let slot = core.splice_in(value, prev, Some(anchor));
        Ok(self.handle(slot))
    }

    /// Detaches `node` and returns its value. `None` if the handle is stale.
    pub fn unlink(&self, node: NodeRef) -> Option<T> {
        let slot = self.slot(node)?;
        self.core.write().take(slot)
    }

    /// Moves `node` to the front. Returns `false` if the handle is stale.
    pub fn to_first(&self, node: NodeRef) -> bool {
        self.move_to_end(node, true)
    }

    /// Moves `node` to the back. Returns `false` if the handle is stale.
    pub fn to_last(&self, node: NodeRef) -> bool {
        self.move_to_end(node, false)
    }

    fn move_to_end(&self, node: NodeRef, front: bool) -> bool {
        let Some(slot) = self.slot(node) else {
            return false;
        };
        let mut core = self.core.write();
        if !core.arena.contains(slot) {
            return false;
        }
        let end = if front { core.ends.head } else { core.ends.tail };
        if end != Some(slot) {
            core.relink(slot, front);
        }
        true
    }

    // -- node values --------------------------------------------------------

    /// Runs `f` on the value of `node`.
    ///
    /// `f` runs under the list read lock and the node's lock, and must not
    /// call back into this list; doing so can deadlock against a waiting
    /// writer.
    pub fn get_with<R>(&self, node: NodeRef, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slot = self.slot(node)?;
        let core = self.core.read();
        let node = core.arena.get(slot)?.read();
        Some(f(&node.value))
    }

    /// Runs `f` on a mutable reference to the value of `node`.
    ///
    /// Only the list read lock and this node's lock are taken, so other
    /// readers and value updates on other nodes proceed concurrently. `f`
    /// must not call back into this list; doing so can deadlock against a
    /// waiting writer.
    pub fn update_with<R>(&self, node: NodeRef, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let slot = self.slot(node)?;
        let core = self.core.read();
        let mut node = core.arena.get(slot)?.write();
        Some(f(&mut node.value))
    }

    /// Replaces the value of `node`, returning the previous one.
    pub fn set_value(&self, node: NodeRef, value: T) -> Option<T> {
        self.update_with(node, |current| mem::replace(current, value))
    }

    // -- search -------------------------------------------------------------

    /// Visits values under the list read lock until `visit` returns `Some`.
    fn scan<R>(&self, reverse: bool, mut visit: impl FnMut(SlotId, &T) -> Option<R>) -> Option<R> {
        let core = self.core.read();
        let mut cursor = if reverse {
            core.ends.tail
        } else {
            core.ends.head
        };
        while let Some(slot) = cursor {
            let node = core.arena.get(slot)?.read();
            if let Some(found) = visit(slot, &node.value) {
                return Some(found);
            }
            cursor = if reverse { node.prev } else { node.next };
        }
        None
    }

    /// Returns the first node whose value satisfies `predicate`.
    pub fn find_first_by(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<NodeRef> {
        self.scan(false, |slot, value| predicate(value).then_some(slot))
            .map(|slot| self.handle(slot))
    }

    /// Returns the last node whose value satisfies `predicate`.
    pub fn find_last_by(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<NodeRef> {
        self.scan(true, |slot, value| predicate(value).then_some(slot))
            .map(|slot| self.handle(slot))
    }

    /// Returns the first `Some` produced by `f`, scanning front to back.
    pub fn find_first_map<R>(&self, mut f: impl FnMut(&T) -> Option<R>) -> Option<R> {
        self.scan(false, |_, value| f(value))
    }

    // -- traversal ----------------------------------------------------------

    /// Calls `f` on every value, front to back.
    ///
    /// `f` runs under the list read lock and must not call back into this
    /// list; doing so can deadlock against a waiting writer.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        self.scan(false, |_, value| {
            f(value);
            None::<()>
        });
    }

    /// Calls `f` on every value, back to front. Same restrictions as
    /// [`for_each`](Self::for_each).
    pub fn for_each_rev(&self, mut f: impl FnMut(&T)) {
        self.scan(true, |_, value| {
            f(value);
            None::<()>
        });
    }

    // -- atomic compound operations -----------------------------------------

    /// Replaces the value of the first node for which `same(existing, &value)`
    /// holds, or inserts `value` at the front if none does. Returns the
    /// replaced value.
    ///
    /// The search and the insert happen under one list write lock, so two
    /// racing calls for equivalent values never both insert.
    pub fn upsert_first_by(&self, value: T, mut same: impl FnMut(&T, &T) -> bool) -> Option<T> {
        let mut core = self.core.write();
        let mut cursor = core.ends.head;
        while let Some(slot) = cursor {
            let Some(cell) = core.arena.get(slot) else {
                break;
            };
            let mut node = cell.write();
            if same(&node.value, &value) {
                return Some(mem::replace(&mut node.value, value));
            }
            cursor = node.next;
        }
        let head = core.ends.head;
        core.splice_in(value, None, head);
        None
    }

    /// Unlinks the first node matching `predicate` and returns its value.
    pub fn remove_first_by(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let mut core = self.core.write();
        let mut cursor = core.ends.head;
        let mut found = None;
        while let Some(slot) = cursor {
            let node = core.arena.get(slot)?.read();
            if predicate(&node.value) {
                found = Some(slot);
                break;
            }
            cursor = node.next;
        }
        core.take(found?)
    }

    /// Replaces the contents of the list with `values`, in order.
    pub fn replace_all(&self, values: impl IntoIterator<Item = T>) {
        let values: Vec<T> = values.into_iter().collect();
        let mut core = self.core.write();
        core.clear();
        for value in values {
            let tail = core.ends.tail;
            core.splice_in(value, tail, None);
        }
    }

    /// Consumes the list, returning its values front to back.
    pub fn into_vec(self) -> Vec<T> {
        let mut core = self.core.into_inner();
        let mut values = Vec::with_capacity(core.arena.len());
        let mut cursor = core.ends.head;
        while let Some(slot) = cursor {
            let Some(cell) = core.arena.remove(slot) else {
                break;
            };
            let node = cell.into_inner();
            cursor = node.next;
            values.push(node.value);
        }
        values
    }

    /// Walks the list in both directions and checks every link.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let core = self.core.read();
        let len = core.arena.len();
        let (head, tail) = match (core.ends.head, core.ends.tail) {
            (None, None) if len == 0 => return Ok(()),
            (Some(head), Some(tail)) if len > 0 => (head, tail),
            _ => {
                return Err(InvariantError::new(format!(
                    "ends disagree with len {len}: head={:?} tail={:?}",
                    core.ends.head, core.ends.tail
                )))
            },
        };

        let mut seen = FxHashSet::default();
        let mut prev = None;
        let mut cursor = Some(head);
        let mut forward = 0usize;
        while let Some(slot) = cursor {
            if !seen.insert(slot) {
                return Err(InvariantError::new("cycle detected walking forward"));
            }
            let node = core
                .arena
                .get(slot)
                .ok_or_else(|| InvariantError::new(format!("dangling link to slot {}", slot.index())))?
                .read();
            if node.prev != prev {
                return Err(InvariantError::new(format!(
                    "slot {} has prev {:?}, expected {:?}",
                    slot.index(),
                    node.prev,
                    prev
                )));
            }
            prev = Some(slot);
            cursor = node.next;
            forward += 1;
        }
        if prev != Some(tail) {
            return Err(InvariantError::new("forward walk does not end at tail"));
        }

        let mut cursor = Some(tail);
        let mut backward = 0usize;
        while let Some(slot) = cursor {
            backward += 1;
            if backward > len {
                return Err(InvariantError::new("cycle detected walking backward"));
            }
            cursor = core
                .arena
                .get(slot)
                .ok_or_else(|| InvariantError::new(format!("dangling link to slot {}", slot.index())))?
                .read()
                .prev;
        }

        if forward != len || backward != len {
            return Err(InvariantError::new(format!(
                "len is {len} but forward walk saw {forward} and backward walk saw {backward}"
            )));
        }
        Ok(())
    }
}

impl<T: Clone> LinkedList<T> {
    /// Returns a clone of the front value.
    pub fn peek_first(&self) -> Option<T> {
        self.first_with(T::clone)
    }

    /// Returns a clone of the back value.
    pub fn peek_last(&self) -> Option<T> {
        self.last_with(T::clone)
    }

    /// Returns a clone of the value of `node`.
    pub fn get(&self, node: NodeRef) -> Option<T> {
        self.get_with(node, T::clone)
    }

    /// Snapshots the values front to back.
    pub fn to_vec(&self) -> Vec<T> {
        let mut values = Vec::new();
        self.for_each(|value| values.push(value.clone()));
        values
    }

    /// Snapshots the values back to front.
    pub fn to_vec_rev(&self) -> Vec<T> {
        let mut values = Vec::new();
        self.for_each_rev(|value| values.push(value.clone()));
        values
    }

    /// Replaces the contents of the list with a copy of `values`.
    pub fn replace_from_slice(&self, values: &[T]) {
        self.replace_all(values.iter().cloned());
    }
}

impl<T: PartialEq> LinkedList<T> {
    /// Returns `true` if any node holds `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.scan(false, |_, v| (v == value).then_some(()))
            .is_some()
    }

    /// Returns the first node holding `value`.
    pub fn find_first(&self, value: &T) -> Option<NodeRef> {
        self.find_first_by(|v| v == value)
    }

    /// Returns the last node holding `value`.
    pub fn find_last(&self, value: &T) -> Option<NodeRef> {
        self.find_last_by(|v| v == value)
    }
}

impl<T> Default for LinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LinkedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedList")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> FromIterator<T> for LinkedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let list = Self::new();
        list.replace_all(iter);
        list
    }
}

impl<T> Extend<T> for LinkedList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add_last(value);
        }
    }
}
