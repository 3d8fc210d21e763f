//! Component-level event delivery.
//!
//! Components announce state transitions (an animation started, a particle
//! effect stopped, ...) through
//! [`World::raise_event`](crate::world::World::raise_event). The world does not
//! interpret events; it hands each one to the handlers subscribed to its
//! [`EventKind`], exactly once.
//!
//! Events raised while the owning entity is not attached to the scene are
//! cached per entity and delivered in order when the entity is attached. The
//! cache is discarded if the entity is destroyed first.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;
use crate::entity::EntityId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    AnimationStarted,
    AnimationStopped,
    ParticleEffectStarted,
    ParticleEffectStopped,
    /// Application-defined kind.
    Custom(u32),
}

/// One delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneEvent {
    pub entity: EntityId,
    pub component: ComponentTypeId,
    pub kind: EventKind,
}

/// Handler callback.
pub type EventHandler = Box<dyn FnMut(&SceneEvent) + Send + Sync>;

/// Routes events to handlers by kind and holds the per-entity cache.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<EventHandler>>,
    cache: HashMap<EntityId, Vec<SceneEvent>>,
    delivered: u64,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("kinds", &self.handlers.len())
            .field("cached_entities", &self.cache.len())
            .field("delivered", &self.delivered)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to every event of `kind`.
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Drop every handler subscribed to `kind`.
    pub fn unsubscribe_all(&mut self, kind: EventKind) {
        self.handlers.remove(&kind);
    }

    /// Number of events delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Events waiting for `entity` to be attached.
    pub fn cached(&self, entity: EntityId) -> &[SceneEvent] {
        self.cache
            .get(&entity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn deliver(&mut self, event: SceneEvent) {
        self.delivered += 1;
        match self.handlers.get_mut(&event.kind) {
            Some(handlers) => {
                for handler in handlers.iter_mut() {
                    handler(&event);
                }
            }
            None => tracing::trace!(?event, "event has no subscribers"),
        }
    }

    pub(crate) fn defer(&mut self, event: SceneEvent) {
        self.cache.entry(event.entity).or_default().push(event);
    }

    /// Deliver and clear everything cached for `entity`.
    pub(crate) fn flush(&mut self, entity: EntityId) {
        if let Some(events) = self.cache.remove(&entity) {
            for event in events {
                self.deliver(event);
            }
        }
    }

    pub(crate) fn forget(&mut self, entity: EntityId) {
        self.cache.remove(&entity);
    }
}
