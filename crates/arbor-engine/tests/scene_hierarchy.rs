//! End-to-end scene tests through the engine layer: observers, events,
//! reparenting and transform propagation working together across ticks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use arbor_engine::prelude::*;
use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Default, PartialEq)]
struct Camera {
    fov: f32,
}

fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, y, z))
}

#[test]
fn chain_scenario_recomputes_two_of_three() {
    let mut world = World::new();
    let root = world.root();
    let a = world.spawn("a");
    let b = world.spawn("b");
    let c = world.spawn("c");
    world.add_child(root, a).unwrap();
    world.add_child(a, b).unwrap();
    world.add_child(b, c).unwrap();

    let mut tick_loop = TickLoop::new(world, &EngineConfig::default()).unwrap();
    tick_loop.tick();

    let t = translation(1.0, 0.0, 0.0);
    tick_loop.world_mut().set_local_transform(b, t).unwrap();
    let stats = tick_loop.tick();

    let world = tick_loop.world();
    assert_eq!(stats.recomputed, 2);
    assert_eq!(world.world_transform(a), Some(Mat4::IDENTITY));
    assert_eq!(world.world_transform(b), Some(t));
    assert_eq!(world.world_transform(c), Some(t));
}

#[test]
fn camera_index_follows_scene_membership() {
    let mut world = World::new();
    let camera = world.register_component_with_default::<Camera>("camera");
    let index = world.add_observer(Box::new(ComponentIndex::new(camera)));
    let root = world.root();

    let rig = world.spawn("rig");
    let cam = world.spawn("cam");
    world.add_component(cam, Camera { fov: 60.0 }).unwrap();
    world.add_child(rig, cam).unwrap();
    assert!(world.observer::<ComponentIndex>(index).unwrap().is_empty());

    world.add_child(root, rig).unwrap();
    assert_eq!(world.observer::<ComponentIndex>(index).unwrap().entities(), &[cam]);
    assert_eq!(world.entities_with_component(camera), vec![cam]);

    // A second camera on the same entity counts as another instance.
    world.get_or_create_component::<Camera>(cam, 1).unwrap();
    assert_eq!(world.observer::<ComponentIndex>(index).unwrap().instances(cam), 2);

    world.detach(rig).unwrap();
    assert!(world.observer::<ComponentIndex>(index).unwrap().is_empty());
    assert!(world.remove_observer(index).is_some());
    assert!(world.observer::<ComponentIndex>(index).is_none());
}

#[test]
fn particle_events_reach_subscribers_once() {
    #[derive(Debug, Clone, Default)]
    struct ParticleEffect;

    let mut world = World::new();
    let effect = world.register_component_with_default::<ParticleEffect>("particle_effect");
    let started = Arc::new(AtomicU32::new(0));
    let counter = started.clone();
    world.events_mut().subscribe(
        EventKind::ParticleEffectStarted,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let smoke = world.spawn("smoke");
    world.add_component(smoke, ParticleEffect).unwrap();
    world
        .raise_event(smoke, effect, EventKind::ParticleEffectStarted)
        .unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 0);

    world.add_child(world.root(), smoke).unwrap();
    world.detach(smoke).unwrap();
    world.add_child(world.root(), smoke).unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

#[test]
fn destroyed_entities_cached_events_are_dropped() {
    let mut world = World::new();
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    world.events_mut().subscribe(
        EventKind::AnimationStarted,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let dancer = world.spawn("dancer");
    world.add_component(dancer, AnimationComponent::default()).unwrap();
    world.start_animation(dancer).unwrap();
    world.destroy(dancer).unwrap();

    let other = world.spawn("other");
    world.add_child(world.root(), other).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(world.events().delivered(), 0);
}

#[test]
fn cloned_subtree_gets_fresh_ids_when_attached() {
    let mut world = World::new();
    let root = world.root();
    let car = world.spawn("car");
    let wheel = world.spawn("wheel");
    world.add_child(car, wheel).unwrap();
    world.add_child(root, car).unwrap();
    world.set_local_transform(car, translation(0.0, 0.0, 5.0)).unwrap();

    let copy = world.clone_entity(car).unwrap();
    world.set_name(copy, "car2").unwrap();
    world.add_child(root, copy).unwrap();

    let mut tick_loop = TickLoop::new(world, &EngineConfig::default()).unwrap();
    tick_loop.tick();
    let world = tick_loop.world();

    let copy_wheel = world.find_by_name(copy, "wheel").unwrap();
    assert_ne!(world.id(copy), world.id(car));
    assert_ne!(world.id(copy_wheel), 0);
    assert_eq!(world.find_by_id(world.id(copy_wheel)), Some(copy_wheel));
    assert_eq!(world.full_name(copy_wheel).as_deref(), Some("car2->wheel"));
    assert_eq!(world.world_transform(copy_wheel), Some(translation(0.0, 0.0, 5.0)));
}
