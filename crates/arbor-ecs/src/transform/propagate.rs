//! Incremental world-transform propagation.
//!
//! Each pass runs in two phases:
//!
//! 1. **Mark.** Every entity named in the change lists gets
//!    `TRANSFORM_NEEDS_RECOMPUTE | TRANSFORM_DIRTY`. The walk then climbs
//!    through its ancestors setting `TRANSFORM_DIRTY`, stopping at the first
//!    ancestor that is already dirty (its chain is already scheduled) or at
//!    the top-most entity below the scene root, which goes on the work list.
//! 2. **Sweep.** Each work-list entry is walked depth-first with an explicit
//!    stack. A node that needs recompute is recomputed and forces its whole
//!    subtree to be recomputed too. A node that is only dirty is skipped,
//!    and only its dirty children are descended into. Subtrees with neither
//!    flag are never visited.
//!
//! Every visited node ends the pass with both flags cleared.

use glam::Mat4;
use tracing::{debug, warn};

use crate::entity::{EntityFlags, EntityId};
use crate::world::World;

use super::{AnimationComponent, TransformComponent};

/// Counters for one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Change-list entries consumed, stale ones included.
    pub drained: usize,
    /// Entries skipped because the entity was gone or detached.
    pub stale: usize,
    /// Subtree roots placed on the work list.
    pub subtree_roots: usize,
    /// Nodes popped off the sweep stack.
    pub visited: usize,
    /// Entities whose world matrix was rewritten.
    pub recomputed: usize,
}

/// Drives transform propagation for a [`World`].
///
/// Holds only scratch buffers, reused across passes.
#[derive(Debug, Default)]
pub struct TransformSystem {
    drained: Vec<EntityId>,
    work: Vec<EntityId>,
    stack: Vec<(EntityId, bool)>,
    last: PropagationStats,
    total_recomputed: u64,
}

impl TransformSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size the sweep stack and work list.
    pub fn with_capacity(stack: usize, work_list: usize) -> Self {
        Self {
            work: Vec::with_capacity(work_list),
            stack: Vec::with_capacity(stack),
            ..Self::default()
        }
    }

    /// Stats of the most recent pass.
    pub fn last_stats(&self) -> PropagationStats {
        self.last
    }

    /// Entities recomputed over the system's lifetime.
    pub fn total_recomputed(&self) -> u64 {
        self.total_recomputed
    }

    /// Drain `world`'s change lists and bring every affected world matrix up
    /// to date.
    pub fn process(&mut self, world: &mut World) -> PropagationStats {
        let mut stats = PropagationStats::default();

        self.drained.clear();
        world.transform_changes.drain_into(&mut self.drained);
        stats.drained = self.drained.len();

        for &entity in &self.drained {
            if !world.in_scene(entity) {
                warn!(?entity, "skipping stale transform change");
                stats.stale += 1;
                continue;
            }
            mark(world, entity, &mut self.work);
        }
        stats.subtree_roots = self.work.len();

        for &top in &self.work {
            sweep(world, top, &mut self.stack, &mut stats);
        }
        self.work.clear();

        self.total_recomputed += stats.recomputed as u64;
        self.last = stats;
        if stats.drained > 0 {
            debug!(
                drained = stats.drained,
                roots = stats.subtree_roots,
                visited = stats.visited,
                recomputed = stats.recomputed,
                "transform pass"
            );
        }
        stats
    }
}

/// Phase 1 for a single entity.
fn mark(world: &mut World, entity: EntityId, work: &mut Vec<EntityId>) {
    let root = world.root();
    let Some(node) = world.node_mut(entity) else {
        return;
    };
    let already_dirty = node.flags.contains(EntityFlags::TRANSFORM_DIRTY);
    node.flags.insert(EntityFlags::TRANSFORM_MASK);
    if already_dirty {
        return;
    }

    let mut current = entity;
    loop {
        let parent = world.node(current).and_then(|n| n.parent);
        let Some(parent) = parent.filter(|&p| p != root) else {
            work.push(current);
            return;
        };
        let Some(parent_node) = world.node_mut(parent) else {
            return;
        };
        if parent_node.flags.contains(EntityFlags::TRANSFORM_DIRTY) {
            return;
        }
        parent_node.flags.insert(EntityFlags::TRANSFORM_DIRTY);
        current = parent;
    }
}

/// Phase 2 from one subtree root.
fn sweep(
    world: &mut World,
    top: EntityId,
    stack: &mut Vec<(EntityId, bool)>,
    stats: &mut PropagationStats,
) {
    stack.clear();
    stack.push((top, false));

    while let Some((entity, forced)) = stack.pop() {
        let Some(node) = world.node_mut(entity) else {
            continue;
        };
        stats.visited += 1;
        let flags = node.flags;
        node.flags.remove(EntityFlags::TRANSFORM_MASK);

        if forced || flags.contains(EntityFlags::TRANSFORM_NEEDS_RECOMPUTE) {
            if recompute(world, entity) {
                stats.recomputed += 1;
            }
            stack.extend(world.children(entity).iter().rev().map(|&c| (c, true)));
        } else if flags.contains(EntityFlags::TRANSFORM_DIRTY) {
            let dirty_children = world.children(entity).iter().rev().filter(|&&c| {
                world
                    .flags(c)
                    .is_some_and(|f| f.intersects(EntityFlags::TRANSFORM_MASK))
            });
            stack.extend(dirty_children.map(|&c| (c, false)));
        }
    }
}

/// Rewrite `entity`'s world matrix from its parent's. Returns `false` if the
/// entity carries no transform.
fn recompute(world: &mut World, entity: EntityId) -> bool {
    let parent_world = world
        .parent(entity)
        .and_then(|p| world.get_component::<TransformComponent>(p, 0))
        .map_or(Mat4::IDENTITY, TransformComponent::world);
    let animation = world
        .get_component::<AnimationComponent>(entity, 0)
        .map(AnimationComponent::offset);

    let Some(transform) = world.get_component_mut::<TransformComponent>(entity, 0) else {
        return false;
    };
    let local = match animation {
        Some(offset) => transform.local() * offset,
        None => transform.local(),
    };
    transform.set_world(parent_world * local);
    true
}
