//! Arbor ECS -- hierarchical entity/component storage with incremental
//! transform propagation.
//!
//! Entities live in an arena inside a [`World`](world::World) and own an
//! ordered list of boxed components plus a list of child entities. The
//! *shape* of each entity's component list is interned as a shared
//! [`Family`](family::Family), so "the n-th component of type T" is a table
//! lookup. World matrices are kept up to date by a
//! [`TransformSystem`](transform::TransformSystem) that only visits subtrees
//! containing a change.
//!
//! # Quick Start
//!
//! ```
//! use arbor_ecs::prelude::*;
//! use glam::{Mat4, Vec3};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Render { mesh: u32 }
//!
//! let mut world = World::new();
//! world.register_component_with_default::<Render>("render");
//!
//! let car = world.spawn("car");
//! let wheel = world.spawn("wheel");
//! world.add_component(wheel, Render { mesh: 7 }).unwrap();
//! world.add_child(car, wheel).unwrap();
//! world.add_child(world.root(), car).unwrap();
//!
//! let offset = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
//! world.set_local_transform(car, offset).unwrap();
//!
//! let mut transforms = TransformSystem::new();
//! transforms.process(&mut world);
//! assert_eq!(world.world_transform(wheel), Some(offset));
//! assert_eq!(world.full_name(wheel).as_deref(), Some("car->wheel"));
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod event;
pub mod family;
pub mod observer;
pub mod transform;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent { name: String, registered: String },

    /// The entity has fewer than `index + 1` components of that type.
    #[error("entity {entity:?} has no component '{component}' at index {index}")]
    MissingComponent {
        entity: entity::EntityId,
        component: String,
        index: u32,
    },

    /// Default construction was requested for a type without a factory.
    #[error("component type '{component}' has no factory")]
    NoFactory { component: String },

    /// The link would make an entity its own ancestor.
    #[error("cannot make {child:?} a child of {parent:?}: it is an ancestor of its new parent")]
    HierarchyCycle {
        parent: entity::EntityId,
        child: entity::EntityId,
    },

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild {
        parent: entity::EntityId,
        child: entity::EntityId,
    },

    /// Structural operation attempted on the scene root.
    #[error("the scene root cannot be reparented, detached or destroyed")]
    RootEntity,

    /// The operation is only valid on detached entities.
    #[error("entity {entity:?} is attached to the scene")]
    AttachedToScene { entity: entity::EntityId },

    #[error("component mask is limited to {max} types")]
    TooManyComponentTypes { max: usize },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{
        Component, ComponentInfo, ComponentMask, ComponentRegistry, ComponentTypeId,
    };
    pub use crate::entity::{EntityFlags, EntityId};
    pub use crate::event::{EventKind, SceneEvent};
    pub use crate::family::Family;
    pub use crate::observer::{ComponentIndex, ObserverId, SceneObserver};
    pub use crate::transform::{
        AnimationComponent, PropagationStats, Transform, TransformComponent, TransformSystem,
    };
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
