//! Entity handles, allocation, and per-entity flags.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* (arena slot) in the low 32 bits. The generation
//! is bumped every time a slot is recycled, so a handle kept past its
//! entity's destruction is detected instead of silently aliasing a new
//! entity. Parent links and change-list entries are stored as handles for
//! exactly this reason.
//!
//! The handle is distinct from the entity's *scene id*, the small numeric
//! identifier assigned when an entity is attached to a scene (see
//! [`World::id`](crate::world::World::id)).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
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
/// Free indices are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation for each index slot.
    generations: Vec<u32>,
    /// Whether the slot is currently alive.
    alive: Vec<bool>,
    /// Free-list of recyclable indices (FIFO queue).
    free_indices: VecDeque<u32>,
    alive_count: usize,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh [`EntityId`].
    ///
    /// If a recycled index is available it will be reused with an incremented
    /// generation; otherwise a brand-new index is created.
    pub fn allocate(&mut self) -> EntityId {
        self.alive_count += 1;
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on deallocate.
            self.alive[index as usize] = true;
            EntityId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            EntityId::new(index, 0)
        }
    }

    /// Release a handle, incrementing the generation for that index so that
    /// any outstanding copies become stale.
    ///
    /// Returns `true` if the entity was alive and is now released,
    /// `false` if it was already dead or had a stale generation.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        self.alive_count -= 1;
        true
    }

    /// Returns `true` if `id` refers to a currently alive entity whose
    /// generation matches the allocator's current generation for that index.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        if idx >= self.generations.len() {
            return false;
        }
        self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// Total number of currently alive entities.
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Number of slots ever allocated (alive or free).
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }
}

// ---------------------------------------------------------------------------
// EntityFlags
// ---------------------------------------------------------------------------

/// Per-entity flag bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityFlags(u32);

impl EntityFlags {
    pub const NONE: Self = Self(0);
    /// The entity and its subtree should be drawn.
    pub const VISIBLE: Self = Self(1 << 1);
    /// This entity's own world transform must be recomputed.
    pub const TRANSFORM_NEEDS_RECOMPUTE: Self = Self(1 << 11);
    /// This entity or some descendant needs recomputing.
    pub const TRANSFORM_DIRTY: Self = Self(1 << 12);

    /// Both transform bits.
    pub const TRANSFORM_MASK: Self =
        Self(Self::TRANSFORM_NEEDS_RECOMPUTE.0 | Self::TRANSFORM_DIRTY.0);

    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: EntityFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: EntityFlags) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn insert(&mut self, other: EntityFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: EntityFlags) {
        self.0 &= !other.0;
    }
}

impl Default for EntityFlags {
    /// New entities start visible with clean transforms.
    fn default() -> Self {
        Self::VISIBLE
    }
}

impl fmt::Debug for EntityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityFlags({:#b})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
