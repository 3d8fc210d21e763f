//! Scene registration hooks.
//!
//! Systems that keep their own per-component-type indices (for example "all
//! entities with a camera") implement [`SceneObserver`] and are registered
//! with [`World::add_observer`](crate::world::World::add_observer). The world
//! calls them whenever an entity or component enters or leaves the scene:
//!
//! - attaching a subtree to the scene calls `entity_registered` for every
//!   entity in it, followed by `component_registered` for each of its
//!   components;
//! - adding a component to an attached entity calls `component_registered`;
//! - removing or detaching a component from an attached entity calls
//!   `component_unregistered` *before* the component is unlinked;
//! - detaching or destroying a subtree calls `component_unregistered` for
//!   each component and then `entity_unregistered`, for every entity in it.

use std::any::Any;
use std::collections::HashMap;

use crate::component::{Component, ComponentTypeId};
use crate::entity::EntityId;

/// Upcast helper so observers can be fetched back by concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Callback interface for scene membership changes. All methods default to
/// doing nothing.
pub trait SceneObserver: AsAny + Send + Sync {
    fn entity_registered(&mut self, _entity: EntityId) {}

    fn entity_unregistered(&mut self, _entity: EntityId) {}

    fn component_registered(
        &mut self,
        _entity: EntityId,
        _type_id: ComponentTypeId,
        _component: &dyn Component,
    ) {
    }

    fn component_unregistered(
        &mut self,
        _entity: EntityId,
        _type_id: ComponentTypeId,
        _component: &dyn Component,
    ) {
    }
}

/// Handle returned by [`World::add_observer`](crate::world::World::add_observer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u32);

// ---------------------------------------------------------------------------
// ComponentIndex
// ---------------------------------------------------------------------------

/// Tracks which attached entities hold at least one component of a given
/// type, in the order they acquired it.
#[derive(Debug)]
pub struct ComponentIndex {
    type_id: ComponentTypeId,
    /// Entity -> number of instances currently registered.
    counts: HashMap<EntityId, u32>,
    order: Vec<EntityId>,
}

impl ComponentIndex {
    pub fn new(type_id: ComponentTypeId) -> Self {
        Self {
            type_id,
            counts: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.order
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.counts.contains_key(&entity)
    }

    /// Registered instances of the tracked type on `entity`.
    pub fn instances(&self, entity: EntityId) -> u32 {
        self.counts.get(&entity).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl SceneObserver for ComponentIndex {
    fn component_registered(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        _component: &dyn Component,
    ) {
        if type_id != self.type_id {
            return;
        }
        let count = self.counts.entry(entity).or_insert(0);
        if *count == 0 {
            self.order.push(entity);
        }
        *count += 1;
    }

    fn component_unregistered(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        _component: &dyn Component,
    ) {
        if type_id != self.type_id {
            return;
        }
        let Some(count) = self.counts.get_mut(&entity) else {
            tracing::warn!(?entity, ?type_id, "unregistering a component that was never registered");
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&entity);
            self.order.retain(|&e| e != entity);
        }
    }
}
