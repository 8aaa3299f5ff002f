//! Generational arena holding the quadtree nodes.
//!
//! Nodes reference each other by [`PatchId`]. Removing a node bumps its
//! slot's generation, so ids held by in-flight tasks or transitions simply
//! stop resolving instead of aliasing a newer node.

use std::fmt;

/// Handle to a node in a [`PatchArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId {
    index: u32,
    generation: u32,
}

impl PatchId {
    /// Slot index.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Slot generation at the time this id was issued.
    #[must_use]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with free-list reuse.
#[derive(Debug)]
pub struct PatchArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for PatchArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PatchArena<T> {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store a value and return its id.
    pub fn insert(&mut self, value: T) -> PatchId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return PatchId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        PatchId {
            index,
            generation: 0,
        }
    }

    /// Remove a value; stale ids return `None`.
    pub fn remove(&mut self, id: PatchId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    /// Borrow a live value.
    #[must_use]
    pub fn get(&self, id: PatchId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_ref())
    }

    /// Mutably borrow a live value.
    pub fn get_mut(&mut self, id: PatchId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Whether `id` refers to a live value.
    #[must_use]
    pub fn contains(&self, id: PatchId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live values with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (PatchId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value.as_ref().map(|v| {
                (
                    PatchId {
                        index: i as u32,
                        generation: s.generation,
                    },
                    v,
                )
            })
        })
    }

    /// Mutably iterate over live values.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|s| s.value.as_mut())
    }

    /// Remove and return every live value.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(v) = slot.value.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(i as u32);
                out.push(v);
            }
        }
        self.len = 0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut arena = PatchArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_stale_id_does_not_alias_reused_slot() {
        let mut arena = PatchArena::new();
        let old = arena.insert(1);
        assert_eq!(arena.remove(old), Some(1));
        let new = arena.insert(2);
        assert_eq!(old.index(), new.index(), "slot should be reused");
        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert_eq!(arena.remove(old), None);
    }

    #[test]
    fn test_double_remove_is_none() {
        let mut arena = PatchArena::new();
        let id = arena.insert(());
        assert!(arena.remove(id).is_some());
        assert!(arena.remove(id).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn test_iter_and_drain() {
        let mut arena = PatchArena::new();
        let ids: Vec<_> = (0..5).map(|i| arena.insert(i)).collect();
        arena.remove(ids[2]);
        let seen: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(seen, vec![0, 1, 3, 4]);

        for v in arena.values_mut() {
            *v *= 10;
        }
        let mut drained = arena.drain();
        drained.sort_unstable();
        assert_eq!(drained, vec![0, 10, 30, 40]);
        assert!(arena.is_empty());
        assert!(ids.iter().all(|id| !arena.contains(*id)));
    }

    #[test]
    fn test_display() {
        let mut arena = PatchArena::new();
        let id = arena.insert(());
        assert_eq!(id.to_string(), "0v0");
    }
}
