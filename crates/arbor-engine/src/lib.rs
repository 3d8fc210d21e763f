//! Arbor Engine -- tick driver, configuration and diagnostics around
//! [`arbor_ecs`].
//!
//! A [`TickLoop`](tick::TickLoop) owns a [`World`](arbor_ecs::world::World)
//! and runs user systems in a fixed order each tick, then brings world
//! transforms up to date with a single propagation pass.
//!
//! # Quick Start
//!
//! ```
//! use arbor_engine::prelude::*;
//! use glam::{Mat4, Vec3};
//!
//! fn spin(world: &mut World) {
//!     let root = world.root();
//!     if let Some(top) = world.child(root, 0) {
//!         let t = Mat4::from_translation(Vec3::X);
//!         world.set_local_transform(top, t).unwrap();
//!     }
//! }
//!
//! let mut world = World::new();
//! let top = world.spawn("top");
//! let leaf = world.spawn("leaf");
//! world.add_child(top, leaf).unwrap();
//! world.add_child(world.root(), top).unwrap();
//!
//! let mut tick_loop = TickLoop::new(world, &EngineConfig::default()).unwrap();
//! tick_loop.add_system("spin", spin);
//! tick_loop.run_ticks(3);
//!
//! assert_eq!(tick_loop.tick_count(), 3);
//! assert_eq!(
//!     tick_loop.world().world_transform(leaf),
//!     Some(Mat4::from_translation(Vec3::X))
//! );
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod digest;
pub mod logging;
pub mod tick;

/// Re-export the ECS crate for convenience.
pub use arbor_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Ecs(#[from] arbor_ecs::EcsError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file '{path}': {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use arbor_ecs::prelude::*;

    pub use crate::config::{EngineConfig, TransformConfig};
    pub use crate::digest::scene_digest;
    pub use crate::tick::{SystemFn, TickDiagnostics, TickLoop};
    pub use crate::EngineError;
}
