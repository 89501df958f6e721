//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in
//! the high 32 bits and an *index* in the low 32 bits. The generation is
//! bumped every time an index is recycled, which lets stale handles be
//! detected immediately instead of dangling into reused memory.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`EntityId`]s with generational tracking.
///
/// Recycled indices sit in a FIFO queue so generations spread out over
/// time instead of concentrating churn on one hot slot.
#[derive(Debug)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
    /// Hard cap on simultaneously alive entities.
    capacity: usize,
}

/// Raised when the allocator is asked to grow past its configured capacity.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("entity store capacity exceeded (limit {limit})")]
pub struct CapacityExceeded {
    pub limit: usize,
}

impl EntityAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
            capacity,
        }
    }

    /// Number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Allocate a fresh [`EntityId`], recycling an index when possible.
    ///
    /// Returns [`CapacityExceeded`] if allocating would exceed the
    /// configured capacity; the allocator is left unchanged on failure.
    pub fn allocate(&mut self) -> Result<EntityId, CapacityExceeded> {
        if self.alive_count() >= self.capacity {
            return Err(CapacityExceeded {
                limit: self.capacity,
            });
        }
        if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            Ok(EntityId::new(index, self.generations[index as usize]))
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            Ok(EntityId::new(index, 0))
        }
    }

    /// Deallocate (despawn) an entity, bumping its slot's generation.
    ///
    /// Returns `true` if the id was alive and is now despawned; `false` if
    /// it was already dead, stale, or never allocated. Never panics —
    /// callers treat a bad handle as a silent no-op.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        if idx >= self.generations.len() {
            return false;
        }
        if self.generations[idx] != id.generation() || !self.alive[idx] {
            return false;
        }
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest index ever allocated, one past the end of the dense arrays
    /// backing each component column. Used by the store to size columns.
    pub fn slot_count(&self) -> usize {
        self.generations.len()
    }

    /// Current generation for a slot index. Used to reconstruct a handle
    /// from an index during iteration.
    pub fn generation_at(&self, index: usize) -> u32 {
        self.generations[index]
    }

    /// Capture generations, alive flags, and free-list for snapshotting.
    pub(crate) fn snapshot_state(&self) -> (Vec<u32>, Vec<bool>, Vec<u32>) {
        (
            self.generations.clone(),
            self.alive.clone(),
            self.free_indices.iter().copied().collect(),
        )
    }

    /// Rebuild an allocator from a previously captured snapshot. The caller
    /// is responsible for having validated internal consistency (lengths
    /// matching, free indices pointing only at dead slots).
    pub(crate) fn restore_from_snapshot(
        capacity: usize,
        generations: Vec<u32>,
        alive: Vec<bool>,
        free_indices: Vec<u32>,
    ) -> Self {
        Self {
            generations,
            alive,
            free_indices: free_indices.into_iter().collect(),
            capacity,
        }
    }
}
