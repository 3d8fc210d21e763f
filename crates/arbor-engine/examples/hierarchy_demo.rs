//! Builds a small solar-system hierarchy, spins it for a few ticks and prints
//! world positions, propagation counters and the scene digest.
//!
//! Run with: `cargo run --example hierarchy_demo [config.json]`
//! Set `RUST_LOG=arbor_ecs=debug` to see per-pass propagation summaries.

use anyhow::Context;
use arbor_engine::prelude::*;
use glam::{Mat4, Quat, Vec3};

#[derive(Debug, Clone, Default)]
struct Orbit {
    radians_per_tick: f32,
}

fn orbit_system(world: &mut World) {
    let Some(orbit_type) = world.registry().lookup::<Orbit>() else {
        return;
    };
    for entity in world.entities_with_component(orbit_type) {
        let Some(speed) = world.get_component::<Orbit>(entity, 0).map(|o| o.radians_per_tick) else {
            continue;
        };
        let Some(local) = world.local_transform(entity) else {
            continue;
        };
        let spun = Mat4::from_quat(Quat::from_rotation_y(speed)) * local;
        if let Err(err) = world.set_local_transform(entity, spun) {
            tracing::warn!(?entity, %err, "orbit update failed");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        None => EngineConfig::default(),
    };
    arbor_engine::logging::init(&config)?;

    let mut world = World::new();
    world.register_component_with_default::<Orbit>("orbit");
    let root = world.root();

    let sun = world.spawn("sun");
    world.add_child(root, sun)?;
    world.add_component(sun, Orbit { radians_per_tick: 0.1 })?;

    let earth = world.spawn("earth");
    world.add_child(sun, earth)?;
    world.set_local_transform(earth, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)))?;

    let moon = world.spawn("moon");
    world.add_child(earth, moon)?;
    world.set_local_transform(moon, Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)))?;
    world.add_component(earth, Orbit { radians_per_tick: 0.5 })?;

    let mut tick_loop = TickLoop::new(world, &config)?;
    tick_loop.add_system("orbit", orbit_system);

    for _ in 0..5 {
        let stats = tick_loop.tick();
        let world = tick_loop.world();
        let moon_pos = world
            .get_component::<TransformComponent>(moon, 0)
            .map(TransformComponent::world_position)
            .context("moon lost its transform")?;
        println!(
            "tick {:>2}  recomputed {}  visited {}  moon at ({:6.2}, {:6.2}, {:6.2})",
            tick_loop.tick_count(),
            stats.recomputed,
            stats.visited,
            moon_pos.x,
            moon_pos.y,
            moon_pos.z,
        );
    }

    let world = tick_loop.world();
    println!("{} entities, {} families", world.entity_count(), world.families().len());
    println!("path: {}", world.full_name(moon).unwrap_or_default());
    println!("digest: {}", scene_digest(world));
    Ok(())
}
