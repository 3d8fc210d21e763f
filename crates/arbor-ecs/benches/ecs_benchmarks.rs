//! Transform propagation and component lookup benchmarks.
//!
//! - **deep**: a single chain; one mutation at the top recomputes every node.
//! - **wide**: one parent with many leaf children; one leaf mutation should
//!   cost about the same regardless of the sibling count.
//! - **lookup**: `get_component` on entities holding several instances of a
//!   type.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Mat4, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use arbor_ecs::entity::EntityId;
use arbor_ecs::transform::TransformSystem;
use arbor_ecs::world::World;

#[derive(Debug, Clone, Default)]
struct Render(u32);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Chain of `depth` entities under the root. Returns (world, top, bottom).
fn deep_scene(depth: usize) -> (World, EntityId, EntityId) {
    let mut world = World::new();
    let bottom = world.spawn("n0");
    let mut top = bottom;
    for i in 1..depth {
        let e = world.spawn(&format!("n{i}"));
        world.add_child(e, top).unwrap();
        top = e;
    }
    let root = world.root();
    world.add_child(root, top).unwrap();
    TransformSystem::new().process(&mut world);
    (world, top, bottom)
}

/// One parent with `width` leaves. Returns (world, leaves).
fn wide_scene(width: usize) -> (World, Vec<EntityId>) {
    let mut world = World::new();
    let root = world.root();
    let parent = world.spawn("parent");
    world.add_child(root, parent).unwrap();
    let leaves = (0..width)
        .map(|i| {
            let e = world.spawn(&format!("leaf{i}"));
            world.add_child(parent, e).unwrap();
            e
        })
        .collect();
    TransformSystem::new().process(&mut world);
    (world, leaves)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_deep(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_deep");
    for depth in [1_000usize, 10_000] {
        let (mut world, top, bottom) = deep_scene(depth);
        let mut system = TransformSystem::with_capacity(depth, 1);
        let mut x = 0.0f32;
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                x += 1.0;
                world
                    .set_local_transform(top, Mat4::from_translation(Vec3::new(x, 0.0, 0.0)))
                    .unwrap();
                black_box(system.process(&mut world));
            });
        });
        black_box(world.world_transform(bottom));
    }
    group.finish();
}

fn bench_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate_wide_single_leaf");
    for width in [100usize, 10_000] {
        let (mut world, leaves) = wide_scene(width);
        let mut system = TransformSystem::new();
        let mut rng = Pcg64::seed_from_u64(42);
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                let leaf = leaves[rng.gen_range(0..leaves.len())];
                world
                    .set_local_transform(leaf, Mat4::from_translation(Vec3::Y))
                    .unwrap();
                black_box(system.process(&mut world));
            });
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut world = World::new();
    world.register_component::<Render>("render");
    let entities: Vec<EntityId> = (0..1_000)
        .map(|i| {
            let e = world.spawn(&format!("e{i}"));
            for k in 0..4 {
                world.add_component(e, Render(k)).unwrap();
            }
            e
        })
        .collect();

    c.bench_function("get_component_nth_of_type", |b| {
        b.iter(|| {
            let mut sum = 0u32;
            for &e in &entities {
                sum += world.get_component::<Render>(e, 3).map_or(0, |r| r.0);
            }
            black_box(sum)
        });
    });
}

criterion_group!(benches, bench_deep, bench_wide, bench_lookup);
criterion_main!(benches);
