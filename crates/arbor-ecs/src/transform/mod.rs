//! Hierarchical transforms.
//!
//! Writes to an entity's local or animation transform go through the
//! [`World`] methods in this module, which queue the entity on the scene's
//! [`TransformChanges`]. A [`TransformSystem`] drains those lists once per
//! tick and recomputes world matrices.

mod changes;
mod component;
mod propagate;

pub use changes::TransformChanges;
pub use component::{AnimationComponent, Transform, TransformComponent};
pub use propagate::{PropagationStats, TransformSystem};

use glam::Mat4;

use crate::entity::EntityId;
use crate::event::EventKind;
use crate::world::World;
use crate::EcsError;

impl World {
    fn transform_mut(&mut self, entity: EntityId) -> Result<&mut TransformComponent, EcsError> {
        if !self.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        self.get_component_mut::<TransformComponent>(entity, 0)
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                component: "transform".to_owned(),
                index: 0,
            })
    }

    /// Replace the local matrix of `entity` and queue it for propagation.
    pub fn set_local_transform(&mut self, entity: EntityId, local: Mat4) -> Result<(), EcsError> {
        self.transform_mut(entity)?.set_local(local);
        self.mark_local_transform_changed(entity);
        Ok(())
    }

    /// [`set_local_transform`](Self::set_local_transform) from position,
    /// rotation and scale.
    pub fn set_local(&mut self, entity: EntityId, transform: Transform) -> Result<(), EcsError> {
        self.set_local_transform(entity, transform.to_matrix())
    }

    /// Queue `entity` after its local matrix was changed some other way,
    /// e.g. through [`get_component_mut`](Self::get_component_mut).
    pub fn mark_local_transform_changed(&mut self, entity: EntityId) {
        if self.in_scene(entity) {
            self.transform_changes.local_changed.push(entity);
        }
    }

    pub fn local_transform(&self, entity: EntityId) -> Option<Mat4> {
        self.get_component::<TransformComponent>(entity, 0)
            .map(TransformComponent::local)
    }

    /// World matrix as of the last propagation pass.
    pub fn world_transform(&self, entity: EntityId) -> Option<Mat4> {
        self.get_component::<TransformComponent>(entity, 0)
            .map(TransformComponent::world)
    }

    /// Pending transform changes for the next pass.
    pub fn transform_changes(&self) -> &TransformChanges {
        &self.transform_changes
    }

    fn animation_mut(&mut self, entity: EntityId) -> Result<&mut AnimationComponent, EcsError> {
        if !self.is_alive(entity) {
            return Err(EcsError::StaleEntity { entity });
        }
        self.get_component_mut::<AnimationComponent>(entity, 0)
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                component: "animation".to_owned(),
                index: 0,
            })
    }

    /// Set the animation offset of `entity` and queue it for propagation.
    pub fn set_animation_transform(
        &mut self,
        entity: EntityId,
        offset: Mat4,
    ) -> Result<(), EcsError> {
        self.animation_mut(entity)?.set_offset(offset);
        if self.in_scene(entity) {
            self.transform_changes.animation_changed.push(entity);
        }
        Ok(())
    }

    /// Start the animation on `entity`. Raises
    /// [`EventKind::AnimationStarted`] only if it was stopped; returns
    /// whether that happened.
    pub fn start_animation(&mut self, entity: EntityId) -> Result<bool, EcsError> {
        self.set_animation_playing(entity, true, EventKind::AnimationStarted)
    }

    /// Stop the animation on `entity`. Raises
    /// [`EventKind::AnimationStopped`] only if it was playing.
    pub fn stop_animation(&mut self, entity: EntityId) -> Result<bool, EcsError> {
        self.set_animation_playing(entity, false, EventKind::AnimationStopped)
    }

    fn set_animation_playing(
        &mut self,
        entity: EntityId,
        playing: bool,
        kind: EventKind,
    ) -> Result<bool, EcsError> {
        if !self.animation_mut(entity)?.set_playing(playing) {
            return Ok(false);
        }
        let animation = self.animation_type;
        self.raise_event(entity, animation, kind)?;
        Ok(true)
    }
}
