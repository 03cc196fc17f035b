//! Dense, monotonic id allocation for rigid bodies, wolves, and packs.
//!
//! Unlike a generational entity allocator (which recycles indices and bumps
//! a generation counter to detect stale handles), ids here are dense and
//! monotonic from 1, never reused within a run -- recycling would let a
//! later entity silently inherit an earlier one's id and defeat the rule
//! that an invalid id access is a silent no-op, not a stale-handle error.
//! `IdAllocator` keeps an allocate/destroy API shape without the
//! recycle/generation machinery.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Allocates monotonically increasing `u32` ids starting at 1 (0 is
/// reserved as a sentinel "no id").
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct IdAllocator {
    next: u32,
    alive: HashSet<u32>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            next: 1,
            alive: HashSet::new(),
        }
    }

    /// Allocate a fresh id. Ids are never reused, even after `destroy`.
    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        self.alive.insert(id);
        id
    }

    /// Mark an id as destroyed. Returns `true` if it was alive.
    pub fn destroy(&mut self, id: u32) -> bool {
        self.alive.remove(&id)
    }

    pub fn is_alive(&self, id: u32) -> bool {
        self.alive.contains(&id)
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    /// Reset to the empty state with ids starting again from 1. Used by
    /// `init_run`/`reset_run` to restart a run deterministically.
    pub fn reset(&mut self) {
        self.next = 1;
        self.alive.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let mut a = IdAllocator::new();
        assert_eq!(a.allocate(), 1);
        assert_eq!(a.allocate(), 2);
        assert_eq!(a.allocate(), 3);
    }

    #[test]
    fn destroyed_ids_are_never_reused() {
        let mut a = IdAllocator::new();
        let id1 = a.allocate();
        a.destroy(id1);
        let id2 = a.allocate();
        assert_ne!(id1, id2);
        assert!(!a.is_alive(id1));
        assert!(a.is_alive(id2));
    }

    #[test]
    fn reset_restarts_numbering() {
        let mut a = IdAllocator::new();
        a.allocate();
        a.allocate();
        a.reset();
        assert_eq!(a.allocate(), 1);
    }
}
