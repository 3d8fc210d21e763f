//! Transform and animation component data.
//!
//! [`Transform`] is the position/rotation/scale form callers usually work
//! with. [`TransformComponent`] is what is stored on an entity: a local
//! matrix written by the application and a world matrix written only by
//! [`TransformSystem`](super::TransformSystem).

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Position, rotation and non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Unit quaternion.
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    #[must_use]
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Decompose an affine matrix. Shear is lost.
    #[must_use]
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// The 4x4 model matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    #[must_use]
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.position += offset;
        self
    }

    #[must_use]
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation * self.rotation;
        self
    }

    #[must_use]
    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale *= factor;
        self
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Transform> for Mat4 {
    fn from(t: Transform) -> Self {
        t.to_matrix()
    }
}

// ---------------------------------------------------------------------------
// TransformComponent
// ---------------------------------------------------------------------------

/// Spatial state of an entity within the hierarchy.
///
/// `world = parent_world * local * animation`, where `parent_world` is the
/// identity for entities whose parent has no transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformComponent {
    local: Mat4,
    world: Mat4,
}

impl TransformComponent {
    pub fn new(local: Mat4) -> Self {
        Self {
            local,
            world: local,
        }
    }

    pub fn from_transform(transform: Transform) -> Self {
        Self::new(transform.to_matrix())
    }

    pub fn local(&self) -> Mat4 {
        self.local
    }

    /// Last value computed by the propagation pass.
    pub fn world(&self) -> Mat4 {
        self.world
    }

    pub fn local_transform(&self) -> Transform {
        Transform::from_matrix(self.local)
    }

    pub fn world_transform(&self) -> Transform {
        Transform::from_matrix(self.world)
    }

    pub fn world_position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    pub(crate) fn set_local(&mut self, local: Mat4) {
        self.local = local;
    }

    pub(crate) fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

// ---------------------------------------------------------------------------
// AnimationComponent
// ---------------------------------------------------------------------------

/// Animation-driven offset applied after the local transform.
///
/// Play state changes go through [`World::start_animation`] and
/// [`World::stop_animation`] so the matching events are raised.
///
/// [`World::start_animation`]: crate::world::World::start_animation
/// [`World::stop_animation`]: crate::world::World::stop_animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationComponent {
    offset: Mat4,
    playing: bool,
}

impl AnimationComponent {
    pub fn offset(&self) -> Mat4 {
        self.offset
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub(crate) fn set_offset(&mut self, offset: Mat4) {
        self.offset = offset;
    }

    /// Returns whether the state actually changed.
    pub(crate) fn set_playing(&mut self, playing: bool) -> bool {
        let changed = self.playing != playing;
        self.playing = playing;
        changed
    }
}

impl Default for AnimationComponent {
    fn default() -> Self {
        Self {
            offset: Mat4::IDENTITY,
            playing: false,
        }
    }
}
