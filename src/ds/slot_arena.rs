//! Generational slot storage with stable handles.
//!
//! Values live in a `Vec` of slots addressed by [`SlotId`]. Freed slots are
//! recycled through a free list, and every removal bumps the slot's
//! generation so a `SlotId` handed out before the removal never resolves to
//! the value that later reuses the slot. A slot whose generation is
//! exhausted is retired instead of recycled.
//!
//! ```text
//!   slots: [ gen 0: A ][ gen 3: - ][ gen 1: C ]
//!   free_list: [1]
//!
//!   SlotId { index: 1, generation: 2 } -> None   (stale)
//!   SlotId { index: 2, generation: 1 } -> Some(C)
//! ```

/// Handle to a slot in a [`SlotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: usize,
    generation: u64,
}

impl SlotId {
    /// Returns the slot index.
    pub fn index(self) -> usize {
        self.index
    }

    /// Returns the generation the handle was issued for.
    pub fn generation(self) -> u64 {
        self.generation
    }
}

/// Generation of a slot that is never handed out again.
const RETIRED: u64 = u64::MAX;

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

impl<T> Slot<T> {
    /// Bumps the generation of a vacated slot. Returns `false` once the slot
    /// has reached [`RETIRED`] and must not be reused.
    fn vacate(&mut self) -> bool {
        self.generation = self.generation.saturating_add(1);
        self.generation != RETIRED
    }
}

#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<usize>,
    len: usize,
}

impl<T> SlotArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> SlotId {
        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index];
            slot.value = Some(value);
            SlotId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            SlotId {
                index: self.slots.len() - 1,
                generation: 0,
            }
        };
        self.len += 1;
        id
    }

    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        if slot.vacate() {
            self.free_list.push(id.index);
        }
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every value. Slots are kept (with bumped generations) so handles
    /// issued before the clear stay stale afterwards.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            let reusable = match slot.value.take() {
                Some(_) => slot.vacate(),
                None => slot.generation != RETIRED,
            };
            if reusable {
                self.free_list.push(index);
            }
        }
        self.len = 0;
    }

    #[cfg(test)]
    fn set_generation(&mut self, index: usize, generation: u64) {
        self.slots[index].generation = generation;
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_arena_insert_remove_reuse() {
        let mut arena = SlotArena::new();
        let id1 = arena.insert("a");
        let id2 = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(id1), Some(&"a"));
        assert_eq!(arena.get(id2), Some(&"b"));

        assert_eq!(arena.remove(id1), Some("a"));
        assert_eq!(arena.len(), 1);

        let id3 = arena.insert("c");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(id3), Some(&"c"));
        assert_eq!(id1.index(), id3.index());
        assert_ne!(id1.generation(), id3.generation());
    }

    #[test]
    fn stale_handle_does_not_resolve_to_reused_slot() {
        let mut arena = SlotArena::new();
        let old = arena.insert(1);
        arena.remove(old);
        let new = arena.insert(2);

        assert_eq!(arena.get(old), None);
        assert!(!arena.contains(old));
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn double_remove_is_noop() {
        let mut arena = SlotArena::new();
        let id = arena.insert(5);
        assert_eq!(arena.remove(id), Some(5));
        assert_eq!(arena.remove(id), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn clear_invalidates_existing_handles() {
        let mut arena = SlotArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        arena.clear();
        assert!(arena.is_empty());

        let c = arena.insert("c");
        let d = arena.insert("d");
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), None);
        assert_eq!(arena.get(c), Some(&"c"));
        assert_eq!(arena.get(d), Some(&"d"));
        // slots are recycled lowest index first after a clear
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn exhausted_generation_retires_slot() {
        let mut arena = SlotArena::new();
        let first = arena.insert(1);
        arena.set_generation(first.index(), RETIRED - 1);
        let old = SlotId {
            index: first.index(),
            generation: RETIRED - 1,
        };
        assert_eq!(arena.get(old), Some(&1));
        assert_eq!(arena.remove(old), Some(1));

        let new = arena.insert(42);
        assert_ne!(new.index(), old.index());
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.get(new), Some(&42));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn clear_never_recycles_retired_slots() {
        let mut arena = SlotArena::new();
        let a = arena.insert("a");
        arena.insert("b");
        arena.set_generation(a.index(), RETIRED - 1);
        arena.clear();
        arena.clear();

        let c = arena.insert("c");
        let d = arena.insert("d");
        assert_eq!(c.index(), 1);
        assert_eq!(d.index(), 2);
        assert_eq!(arena.len(), 2);
    }
}
