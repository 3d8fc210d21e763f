//! Scene digests for determinism checks.
//!
//! [`scene_digest`] serializes a canonical summary of the attached scene tree
//! to JSON and hashes it with BLAKE3. Two worlds built and ticked the same
//! way produce the same digest; entity handles are not part of the summary,
//! so slot reuse does not affect it.

use serde::Serialize;

use arbor_ecs::entity::EntityId;
use arbor_ecs::world::World;

#[derive(Serialize)]
struct NodeSummary<'a> {
    id: u32,
    name: &'a str,
    depth: usize,
    /// Registered component names in canonical order.
    components: Vec<&'a str>,
    /// Column-major world matrix, if the entity has a transform.
    world: Option<[f32; 16]>,
    visible: bool,
}

fn summarize(world: &World) -> Vec<NodeSummary<'_>> {
    let mut out = Vec::new();
    let mut stack: Vec<(EntityId, usize)> = world
        .children(world.root())
        .iter()
        .rev()
        .map(|&c| (c, 0))
        .collect();

    while let Some((entity, depth)) = stack.pop() {
        out.push(NodeSummary {
            id: world.id(entity),
            name: world.name(entity).unwrap_or_default(),
            depth,
            components: world
                .components(entity)
                .map(|(t, _)| world.registry().name_of(t))
                .collect(),
            world: world.world_transform(entity).map(|m| m.to_cols_array()),
            visible: world.is_visible(entity),
        });
        stack.extend(world.children(entity).iter().rev().map(|&c| (c, depth + 1)));
    }
    out
}

/// BLAKE3 hex digest of the attached scene: ids, names, tree shape,
/// component shapes and world matrices.
pub fn scene_digest(world: &World) -> String {
    let summary = summarize(world);
    let json_bytes =
        serde_json::to_vec(&summary).expect("scene summary should always be JSON-serializable");
    blake3::hash(&json_bytes).to_hex().to_string()
}
