//! Property tests for transform propagation on random trees.
//!
//! Trees are generated from a seeded `Pcg64` so failures shrink to a seed.
//! After every pass the cached world matrix of every attached entity must
//! equal the product of local matrices along its path from the root.

use arbor_ecs::prelude::*;
use glam::{Mat4, Vec3};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

struct Scene {
    world: World,
    nodes: Vec<EntityId>,
    transforms: TransformSystem,
}

/// Random tree of `size` entities. Roughly one in eight has no transform.
fn random_scene(seed: u64, size: usize) -> Scene {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut world = World::new();
    let root = world.root();
    let mut nodes = Vec::with_capacity(size);

    for i in 0..size {
        let e = if rng.gen_ratio(1, 8) {
            world.spawn_empty(&format!("g{i}"))
        } else {
            world.spawn(&format!("n{i}"))
        };
        let parent = if nodes.is_empty() || rng.gen_ratio(1, 5) {
            root
        } else {
            nodes[rng.gen_range(0..nodes.len())]
        };
        world.add_child(parent, e).unwrap();
        nodes.push(e);
    }

    let mut transforms = TransformSystem::new();
    transforms.process(&mut world);
    Scene {
        world,
        nodes,
        transforms,
    }
}

fn random_local(rng: &mut Pcg64) -> Mat4 {
    Mat4::from_translation(Vec3::new(
        rng.gen_range(-4i32..=4) as f32,
        rng.gen_range(-4i32..=4) as f32,
        rng.gen_range(-4i32..=4) as f32,
    ))
}

/// World matrix recomputed from scratch by walking up to the root.
fn expected_world(world: &World, entity: EntityId) -> Mat4 {
    let mut m = Mat4::IDENTITY;
    let mut current = Some(entity);
    while let Some(e) = current {
        if let Some(local) = world.local_transform(e) {
            m = local * m;
        }
        current = world.parent(e);
    }
    m
}

fn assert_converged(scene: &Scene) -> Result<(), TestCaseError> {
    for &e in &scene.nodes {
        if let Some(actual) = scene.world.world_transform(e) {
            prop_assert_eq!(actual, expected_world(&scene.world, e), "entity {:?}", e);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn single_mutation_touches_exactly_its_subtree(
        seed in any::<u64>(),
        size in 1usize..60,
        pick in any::<prop::sample::Index>(),
    ) {
        let mut scene = random_scene(seed, size);
        assert_converged(&scene)?;

        let target = scene.nodes[pick.index(scene.nodes.len())];
        let mut rng = Pcg64::seed_from_u64(seed ^ 0x5eed);
        if scene.world.set_local_transform(target, random_local(&mut rng)).is_err() {
            // Transform-less group node; nothing to propagate.
            return Ok(());
        }

        let with_transform = scene
            .world
            .subtree(target)
            .into_iter()
            .filter(|&e| scene.world.has_component::<TransformComponent>(e))
            .count();

        let stats = scene.transforms.process(&mut scene.world);
        prop_assert_eq!(stats.recomputed, with_transform);
        assert_converged(&scene)?;

        let again = scene.transforms.process(&mut scene.world);
        prop_assert_eq!(again.recomputed, 0);
        prop_assert_eq!(again.visited, 0);
    }

    #[test]
    fn random_edits_converge(
        seed in any::<u64>(),
        size in 2usize..40,
        edits in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>(), 0u8..4), 1..30),
    ) {
        let mut scene = random_scene(seed, size);
        let mut rng = Pcg64::seed_from_u64(seed.rotate_left(17));
        let root = scene.world.root();

        for (i, (a, b, action)) in edits.into_iter().enumerate() {
            let x = scene.nodes[a.index(scene.nodes.len())];
            let y = scene.nodes[b.index(scene.nodes.len())];
            match action {
                0 => {
                    let _ = scene.world.set_local_transform(x, random_local(&mut rng));
                }
                // Reparent; cycles are rejected and leave the tree unchanged.
                1 => {
                    let _ = scene.world.add_child(y, x);
                }
                2 => {
                    scene.world.detach(x).unwrap();
                }
                _ => {
                    scene.world.add_child(root, x).unwrap();
                }
            }
            if i % 3 == 0 {
                scene.transforms.process(&mut scene.world);
            }
        }
        scene.transforms.process(&mut scene.world);

        // Only attached entities are guaranteed current.
        let attached: Vec<EntityId> = scene
            .nodes
            .iter()
            .copied()
            .filter(|&e| scene.world.in_scene(e))
            .collect();
        for e in attached {
            if let Some(actual) = scene.world.world_transform(e) {
                prop_assert_eq!(actual, expected_world(&scene.world, e));
            }
        }
        for e in &scene.nodes {
            let flags = scene.world.flags(*e).unwrap();
            prop_assert!(!flags.intersects(EntityFlags::TRANSFORM_MASK));
        }
    }
}
