//! The [`World`] is the top-level container of a scene. It owns the entity
//! arena, the component registry, the family intern table, the scene root,
//! the registration hooks, the event dispatcher, and the per-scene transform
//! change lists.
//!
//! # Ownership
//!
//! Every entity is stored in the arena and addressed by a generational
//! [`EntityId`]. An entity exclusively owns its components (boxed, kept in
//! canonical order) and its children (a list of handles; a child has exactly
//! one parent). Parent links are plain handles, so a destroyed parent is
//! detected instead of dereferenced.
//!
//! # Scene membership
//!
//! The world has a single root entity. An entity is *attached* when it is a
//! descendant of the root; attaching assigns a scene-unique numeric id and
//! fires the [`SceneObserver`] hooks. Entities created with
//! [`spawn`](World::spawn) start detached.

use std::sync::Arc;

use crate::component::{Component, ComponentMask, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityAllocator, EntityFlags, EntityId};
use crate::event::{EventDispatcher, EventKind, SceneEvent};
use crate::family::{Family, FamilyRegistry};
use crate::observer::{ObserverId, SceneObserver};
use crate::transform::{AnimationComponent, TransformChanges, TransformComponent};
use crate::EcsError;

// ---------------------------------------------------------------------------
// EntityNode
// ---------------------------------------------------------------------------

/// One owned component and its registered type.
#[derive(Debug)]
pub(crate) struct ComponentSlot {
    pub type_id: ComponentTypeId,
    pub value: Box<dyn Component>,
}

/// Arena record for one entity.
#[derive(Debug)]
pub(crate) struct EntityNode {
    pub name: String,
    /// Stable-sorted by type. Invariant: `family.types()` equals the
    /// sequence of `type_id`s.
    pub components: Vec<ComponentSlot>,
    pub family: Arc<Family>,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub flags: EntityFlags,
    /// Scene-unique numeric id, 0 when unassigned.
    pub scene_id: u32,
    pub in_scene: bool,
}

impl EntityNode {
    fn slot_of(&self, type_id: ComponentTypeId, index: u32) -> Option<usize> {
        self.family.component_index(type_id, index)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// A scene: entity arena plus everything shared by its entities.
pub struct World {
    allocator: EntityAllocator,
    registry: ComponentRegistry,
    families: FamilyRegistry,
    /// Indexed by `EntityId::index()`.
    pub(crate) nodes: Vec<Option<EntityNode>>,
    root: EntityId,
    next_scene_id: u32,
    observers: Vec<(ObserverId, Box<dyn SceneObserver>)>,
    next_observer: u32,
    events: EventDispatcher,
    pub(crate) transform_changes: TransformChanges,
    pub(crate) transform_type: ComponentTypeId,
    pub(crate) animation_type: ComponentTypeId,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entity_count())
            .field("family_count", &self.families.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a world with an empty scene root.
    ///
    /// The built-in [`TransformComponent`] and [`AnimationComponent`] are
    /// registered first, so they lead the canonical order.
    pub fn new() -> Self {
        let mut registry = ComponentRegistry::new();
        let transform_type = registry.register_with_default::<TransformComponent>("transform");
        let animation_type = registry.register_with_default::<AnimationComponent>("animation");

        let mut world = Self {
            allocator: EntityAllocator::new(),
            registry,
            families: FamilyRegistry::new(),
            nodes: Vec::new(),
            root: EntityId::new(0, 0),
            next_scene_id: 0,
            observers: Vec::new(),
            next_observer: 0,
            events: EventDispatcher::new(),
            transform_changes: TransformChanges::default(),
            transform_type,
            animation_type,
        };
        let root = world.spawn_empty("root");
        if let Some(node) = world.node_mut(root) {
            node.in_scene = true;
        }
        world.root = root;
        world
    }

    // -- registries ---------------------------------------------------------

    /// Read-only access to the component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Mutable access to the component registry, e.g. to install factories.
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Register a component type. Convenience wrapper.
    pub fn register_component<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        self.registry.register::<T>(name)
    }

    /// Register a component type with `T::default` as its factory.
    pub fn register_component_with_default<T: Component + Default>(
        &mut self,
        name: &str,
    ) -> ComponentTypeId {
        self.registry.register_with_default::<T>(name)
    }

    /// The family intern table.
    pub fn families(&self) -> &FamilyRegistry {
        &self.families
    }

    /// Type id of the built-in [`TransformComponent`].
    pub fn transform_type(&self) -> ComponentTypeId {
        self.transform_type
    }

    /// Type id of the built-in [`AnimationComponent`].
    pub fn animation_type(&self) -> ComponentTypeId {
        self.animation_type
    }

    // -- node access --------------------------------------------------------

    pub(crate) fn node(&self, entity: EntityId) -> Option<&EntityNode> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.nodes.get(entity.index() as usize)?.as_ref()
    }

    pub(crate) fn node_mut(&mut self, entity: EntityId) -> Option<&mut EntityNode> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.nodes.get_mut(entity.index() as usize)?.as_mut()
    }

    fn try_node(&self, entity: EntityId) -> Result<&EntityNode, EcsError> {
        self.node(entity).ok_or(EcsError::StaleEntity { entity })
    }

    fn try_node_mut(&mut self, entity: EntityId) -> Result<&mut EntityNode, EcsError> {
        self.node_mut(entity).ok_or(EcsError::StaleEntity { entity })
    }

    fn resolve<T: 'static>(&self) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup::<T>()
            .ok_or_else(|| self.unknown_component(std::any::type_name::<T>()))
    }

    fn unknown_component(&self, name: &str) -> EcsError {
        EcsError::UnknownComponent {
            name: name.to_owned(),
            registered: self.registry.registered_names().join(", "),
        }
    }

    // -- entity lifecycle ---------------------------------------------------

    /// The scene root. Always alive and attached.
    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Create a detached entity carrying a default [`TransformComponent`].
    pub fn spawn(&mut self, name: &str) -> EntityId {
        let entity = self.spawn_empty(name);
        let transform_type = self.transform_type;
        self.insert_slot(entity, transform_type, Box::new(TransformComponent::default()));
        entity
    }

    /// Create a detached entity with no components.
    pub fn spawn_empty(&mut self, name: &str) -> EntityId {
        let entity = self.allocator.allocate();
        let node = EntityNode {
            name: name.to_owned(),
            components: Vec::new(),
            family: self.families.get_or_create(&[]),
            parent: None,
            children: Vec::new(),
            flags: EntityFlags::default(),
            scene_id: 0,
            in_scene: false,
        };
        let idx = entity.index() as usize;
        if idx >= self.nodes.len() {
            self.nodes.resize_with(idx + 1, || None);
        }
        self.nodes[idx] = Some(node);
        entity
    }

    /// Whether `entity` refers to a live entity.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.node(entity).is_some()
    }

    /// Number of live entities, not counting the scene root.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count().saturating_sub(1)
    }

    /// Destroy `entity` and its whole subtree, dropping every component.
    ///
    /// Attached entities are unregistered from the scene first.
    pub fn destroy(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if entity == self.root {
            return Err(EcsError::RootEntity);
        }
        self.try_node(entity)?;
        self.detach(entity)?;

        let doomed = self.subtree(entity);
        for &e in doomed.iter().rev() {
            if let Some(node) = self.nodes[e.index() as usize].take() {
                let EntityNode { family, components, .. } = node;
                drop(components);
                self.families.release(family);
            }
            self.events.forget(e);
            self.allocator.deallocate(e);
        }
        tracing::trace!(?entity, count = doomed.len(), "destroyed subtree");
        Ok(())
    }

    // -- components ---------------------------------------------------------

    /// Attach `value` to `entity`. Returns the occurrence index of the new
    /// instance among components of the same type.
    pub fn add_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<u32, EcsError> {
        let type_id = self.resolve::<T>()?;
        self.try_node(entity)?;
        Ok(self.insert_slot(entity, type_id, Box::new(value)))
    }

    /// Attach an already boxed component of any registered type.
    pub fn add_component_boxed(
        &mut self,
        entity: EntityId,
        value: Box<dyn Component>,
    ) -> Result<u32, EcsError> {
        let type_id = self
            .registry
            .lookup_dyn(value.as_ref())
            .ok_or_else(|| self.unknown_component(value.type_name()))?;
        self.try_node(entity)?;
        Ok(self.insert_slot(entity, type_id, value))
    }

    /// Append, re-sort, refresh the family, and notify the scene.
    /// The entity must be alive.
    fn insert_slot(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        value: Box<dyn Component>,
    ) -> u32 {
        let Some(node) = self.nodes[entity.index() as usize].as_mut() else {
            return 0;
        };
        node.components.push(ComponentSlot { type_id, value });
        // Stable: duplicates keep insertion order, so the new one is last.
        node.components.sort_by_key(|slot| slot.type_id);
        refresh_family(&mut self.families, node);

        let occurrence = node.family.component_count(type_id) - 1;
        if node.in_scene {
            if let Some(slot) = node.slot_of(type_id, occurrence) {
                let component = node.components[slot].value.as_ref();
                for (_, observer) in self.observers.iter_mut() {
                    observer.component_registered(entity, type_id, component);
                }
            }
            self.queue_transform_input(entity, type_id);
        }
        occurrence
    }

    /// Queue an attached `entity` for propagation after a component feeding
    /// its world matrix was added or removed.
    fn queue_transform_input(&mut self, entity: EntityId, type_id: ComponentTypeId) {
        if type_id == self.transform_type {
            self.transform_changes.parent_changed.push(entity);
        } else if type_id == self.animation_type {
            self.transform_changes.animation_changed.push(entity);
        }
    }

    /// Get the `index`-th component of `type_id`.
    pub fn get_component_dyn(
        &self,
        entity: EntityId,
        type_id: ComponentTypeId,
        index: u32,
    ) -> Option<&dyn Component> {
        let node = self.node(entity)?;
        let slot = node.slot_of(type_id, index)?;
        Some(node.components[slot].value.as_ref())
    }

    pub fn get_component_dyn_mut(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        index: u32,
    ) -> Option<&mut dyn Component> {
        let node = self.node_mut(entity)?;
        let slot = node.slot_of(type_id, index)?;
        Some(node.components[slot].value.as_mut())
    }

    /// Typed access to the `index`-th component of type `T`.
    pub fn get_component<T: Component>(&self, entity: EntityId, index: u32) -> Option<&T> {
        let type_id = self.registry.lookup::<T>()?;
        self.get_component_dyn(entity, type_id, index)?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn get_component_mut<T: Component>(
        &mut self,
        entity: EntityId,
        index: u32,
    ) -> Option<&mut T> {
        let type_id = self.registry.lookup::<T>()?;
        self.get_component_dyn_mut(entity, type_id, index)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    /// Whether `entity` holds at least one `T`.
    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.registry
            .lookup::<T>()
            .is_some_and(|t| self.component_count(entity, t) > 0)
    }

    /// Return the `index`-th component of `type_id`, creating a default one
    /// through the registry's factory if it is absent.
    pub fn get_or_create_component_dyn(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        index: u32,
    ) -> Result<&mut dyn Component, EcsError> {
        let node = self.try_node(entity)?;
        let index = match node.slot_of(type_id, index) {
            Some(_) => index,
            None => {
                let value = self.registry.create(type_id).ok_or_else(|| EcsError::NoFactory {
                    component: self.registry.name_of(type_id).to_owned(),
                })?;
                self.insert_slot(entity, type_id, value)
            }
        };
        self.get_component_dyn_mut(entity, type_id, index)
            .ok_or(EcsError::StaleEntity { entity })
    }

    /// Typed [`get_or_create_component_dyn`](Self::get_or_create_component_dyn).
    pub fn get_or_create_component<T: Component>(
        &mut self,
        entity: EntityId,
        index: u32,
    ) -> Result<&mut T, EcsError> {
        let type_id = self.resolve::<T>()?;
        let component = self.get_or_create_component_dyn(entity, type_id, index)?;
        component
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                component: std::any::type_name::<T>().to_owned(),
                index,
            })
    }

    /// Unlink the `index`-th component of `type_id` and hand it back to the
    /// caller.
    pub fn detach_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        index: u32,
    ) -> Result<Box<dyn Component>, EcsError> {
        let node = self.try_node(entity)?;
        let slot = node
            .slot_of(type_id, index)
            .ok_or_else(|| EcsError::MissingComponent {
                entity,
                component: self.registry.name_of(type_id).to_owned(),
                index,
            })?;

        let Some(node) = self.nodes[entity.index() as usize].as_mut() else {
            return Err(EcsError::StaleEntity { entity });
        };
        if node.in_scene {
            let component = node.components[slot].value.as_ref();
            for (_, observer) in self.observers.iter_mut() {
                observer.component_unregistered(entity, type_id, component);
            }
        }
        let in_scene = node.in_scene;
        let removed = node.components.remove(slot);
        refresh_family(&mut self.families, node);
        if in_scene {
            self.queue_transform_input(entity, type_id);
        }
        Ok(removed.value)
    }

    /// Unlink and drop the `index`-th component of `type_id`.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        index: u32,
    ) -> Result<(), EcsError> {
        self.detach_component(entity, type_id, index).map(drop)
    }

    /// Typed [`remove_component`](Self::remove_component).
    pub fn remove_component_of<T: Component>(
        &mut self,
        entity: EntityId,
        index: u32,
    ) -> Result<(), EcsError> {
        let type_id = self.resolve::<T>()?;
        self.remove_component(entity, type_id, index)
    }

    /// Instances of `type_id` on `entity`; 0 for a stale handle.
    pub fn component_count(&self, entity: EntityId, type_id: ComponentTypeId) -> u32 {
        self.node(entity)
            .map_or(0, |n| n.family.component_count(type_id))
    }

    /// Total number of components on `entity`.
    pub fn total_component_count(&self, entity: EntityId) -> usize {
        self.node(entity).map_or(0, |n| n.components.len())
    }

    /// Set of component types present on `entity`.
    pub fn component_mask(&self, entity: EntityId) -> ComponentMask {
        self.node(entity).map_or(ComponentMask::EMPTY, |n| n.family.mask())
    }

    /// The interned family of `entity`.
    pub fn family(&self, entity: EntityId) -> Option<&Family> {
        self.node(entity).map(|n| n.family.as_ref())
    }

    /// Whether `a` and `b` resolve to the same interned family. False if
    /// either handle is stale.
    pub fn shares_family(&self, a: EntityId, b: EntityId) -> bool {
        match (self.node(a), self.node(b)) {
            (Some(na), Some(nb)) => Arc::ptr_eq(&na.family, &nb.family),
            _ => false,
        }
    }

    /// Components of `entity` in canonical order.
    pub fn components(
        &self,
        entity: EntityId,
    ) -> impl Iterator<Item = (ComponentTypeId, &dyn Component)> + '_ {
        self.node(entity)
            .into_iter()
            .flat_map(|n| n.components.iter())
            .map(|slot| (slot.type_id, slot.value.as_ref()))
    }

    // -- hierarchy ----------------------------------------------------------

    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.node(entity)?.parent
    }

    pub fn children(&self, entity: EntityId) -> &[EntityId] {
        self.node(entity)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn child(&self, entity: EntityId, index: usize) -> Option<EntityId> {
        self.children(entity).get(index).copied()
    }

    pub fn child_count(&self, entity: EntityId) -> usize {
        self.children(entity).len()
    }

    /// The sibling after `child` in `parent`'s child list.
    pub fn next_child(&self, parent: EntityId, child: EntityId) -> Option<EntityId> {
        let children = self.children(parent);
        let pos = children.iter().position(|&c| c == child)?;
        children.get(pos + 1).copied()
    }

    /// Whether `entity` is attached to the scene.
    pub fn in_scene(&self, entity: EntityId) -> bool {
        self.node(entity).is_some_and(|n| n.in_scene)
    }

    /// Whether `ancestor` is `entity` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: EntityId, entity: EntityId) -> bool {
        let mut current = Some(entity);
        while let Some(e) = current {
            if e == ancestor {
                return true;
            }
            current = self.parent(e);
        }
        false
    }

    /// `entity` followed by all of its descendants, depth-first pre-order.
    pub fn subtree(&self, entity: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        if self.node(entity).is_none() {
            return out;
        }
        let mut stack = vec![entity];
        while let Some(e) = stack.pop() {
            out.push(e);
            stack.extend(self.children(e).iter().rev().copied());
        }
        out
    }

    /// Append `child` to `parent`'s children, detaching it from its previous
    /// parent first.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), EcsError> {
        self.check_link(parent, child)?;
        self.detach(child)?;
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        self.finish_link(parent, child);
        Ok(())
    }

    /// Insert `child` into `parent`'s children just before `before`.
    pub fn insert_child_before(
        &mut self,
        parent: EntityId,
        child: EntityId,
        before: EntityId,
    ) -> Result<(), EcsError> {
        if child == before {
            return Ok(());
        }
        self.check_link(parent, child)?;
        if !self.children(parent).contains(&before) {
            return Err(EcsError::NotAChild { parent, child: before });
        }
        self.detach(child)?;
        if let Some(p) = self.node_mut(parent) {
            let pos = p
                .children
                .iter()
                .position(|&c| c == before)
                .unwrap_or(p.children.len());
            p.children.insert(pos, child);
        }
        self.finish_link(parent, child);
        Ok(())
    }

    fn check_link(&self, parent: EntityId, child: EntityId) -> Result<(), EcsError> {
        self.try_node(parent)?;
        self.try_node(child)?;
        if child == self.root {
            return Err(EcsError::RootEntity);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(EcsError::HierarchyCycle { parent, child });
        }
        Ok(())
    }

    fn finish_link(&mut self, parent: EntityId, child: EntityId) {
        let parent_in_scene = self.in_scene(parent);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        if parent_in_scene {
            self.register_subtree(child);
            self.transform_changes.parent_changed.push(child);
        }
    }

    /// Remove `child` from `parent`. The child stays alive, detached.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> Result<(), EcsError> {
        self.try_node(parent)?;
        self.try_node(child)?;
        if self.parent(child) != Some(parent) {
            return Err(EcsError::NotAChild { parent, child });
        }
        self.detach(child)
    }

    /// Remove `entity` from its parent, if it has one.
    pub fn detach(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if entity == self.root {
            return Err(EcsError::RootEntity);
        }
        let Some(parent) = self.try_node(entity)?.parent else {
            return Ok(());
        };
        if self.in_scene(entity) {
            self.unregister_subtree(entity);
        }
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != entity);
        }
        if let Some(n) = self.node_mut(entity) {
            n.parent = None;
        }
        Ok(())
    }

    /// Detach every child of `entity`.
    pub fn remove_all_children(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let children = self.try_node(entity)?.children.clone();
        for child in children {
            self.detach(child)?;
        }
        Ok(())
    }

    fn register_subtree(&mut self, top: EntityId) {
        for e in self.subtree(top) {
            let Some(node) = self.nodes[e.index() as usize].as_mut() else {
                continue;
            };
            node.in_scene = true;
            if node.scene_id == 0 {
                self.next_scene_id += 1;
                node.scene_id = self.next_scene_id;
            }
            for (_, observer) in self.observers.iter_mut() {
                observer.entity_registered(e);
                for slot in &node.components {
                    observer.component_registered(e, slot.type_id, slot.value.as_ref());
                }
            }
            self.events.flush(e);
        }
    }

    fn unregister_subtree(&mut self, top: EntityId) {
        for e in self.subtree(top) {
            let Some(node) = self.nodes[e.index() as usize].as_mut() else {
                continue;
            };
            for (_, observer) in self.observers.iter_mut() {
                for slot in &node.components {
                    observer.component_unregistered(e, slot.type_id, slot.value.as_ref());
                }
                observer.entity_unregistered(e);
            }
            node.in_scene = false;
            node.flags.remove(EntityFlags::TRANSFORM_MASK);
            self.transform_changes.erase(e);
        }
    }

    // -- scene ids ----------------------------------------------------------

    /// Scene-unique numeric id; 0 when unassigned or stale.
    pub fn id(&self, entity: EntityId) -> u32 {
        self.node(entity).map_or(0, |n| n.scene_id)
    }

    /// Override the numeric id. Ids are normally assigned on attach.
    pub fn set_id(&mut self, entity: EntityId, id: u32) -> Result<(), EcsError> {
        self.try_node_mut(entity)?.scene_id = id;
        if id > self.next_scene_id {
            self.next_scene_id = id;
        }
        Ok(())
    }

    /// Clear the ids of a detached subtree.
    pub fn reset_id(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if self.try_node(entity)?.in_scene {
            return Err(EcsError::AttachedToScene { entity });
        }
        for e in self.subtree(entity) {
            if let Some(n) = self.node_mut(e) {
                n.scene_id = 0;
            }
        }
        Ok(())
    }

    /// Find an attached entity by numeric id.
    pub fn find_by_id(&self, id: u32) -> Option<EntityId> {
        if id == 0 {
            return None;
        }
        self.subtree(self.root)
            .into_iter()
            .find(|&e| self.id(e) == id)
    }

    // -- names --------------------------------------------------------------

    pub fn name(&self, entity: EntityId) -> Option<&str> {
        self.node(entity).map(|n| n.name.as_str())
    }

    pub fn set_name(&mut self, entity: EntityId, name: &str) -> Result<(), EcsError> {
        self.try_node_mut(entity)?.name = name.to_owned();
        Ok(())
    }

    /// First entity named `name` in `start`'s subtree, pre-order.
    pub fn find_by_name(&self, start: EntityId, name: &str) -> Option<EntityId> {
        self.subtree(start)
            .into_iter()
            .find(|&e| self.name(e) == Some(name))
    }

    /// Every entity in `start`'s subtree whose name contains `part`.
    pub fn find_by_name_part(&self, start: EntityId, part: &str) -> Vec<EntityId> {
        self.subtree(start)
            .into_iter()
            .filter(|&e| self.name(e).is_some_and(|n| n.contains(part)))
            .collect()
    }

    /// Path of names from the top of the tree, e.g. `"level->car->wheel"`.
    /// The scene root is not included.
    pub fn full_name(&self, entity: EntityId) -> Option<String> {
        self.node(entity)?;
        let mut parts = Vec::new();
        let mut current = Some(entity);
        while let Some(e) = current {
            if e == self.root {
                break;
            }
            parts.push(self.name(e).unwrap_or_default());
            current = self.parent(e);
        }
        parts.reverse();
        Some(parts.join("->"))
    }

    // -- flags --------------------------------------------------------------

    pub fn flags(&self, entity: EntityId) -> Option<EntityFlags> {
        self.node(entity).map(|n| n.flags)
    }

    /// Set `flag` on `entity`. The transform bits are owned by propagation
    /// and are ignored here.
    pub fn add_flag(&mut self, entity: EntityId, flag: EntityFlags) -> Result<(), EcsError> {
        self.try_node_mut(entity)?.flags.insert(user_bits(flag));
        Ok(())
    }

    pub fn remove_flag(&mut self, entity: EntityId, flag: EntityFlags) -> Result<(), EcsError> {
        self.try_node_mut(entity)?.flags.remove(user_bits(flag));
        Ok(())
    }

    pub fn add_flag_recursive(&mut self, entity: EntityId, flag: EntityFlags) -> Result<(), EcsError> {
        self.try_node(entity)?;
        for e in self.subtree(entity) {
            if let Some(n) = self.node_mut(e) {
                n.flags.insert(user_bits(flag));
            }
        }
        Ok(())
    }

    pub fn remove_flag_recursive(
        &mut self,
        entity: EntityId,
        flag: EntityFlags,
    ) -> Result<(), EcsError> {
        self.try_node(entity)?;
        for e in self.subtree(entity) {
            if let Some(n) = self.node_mut(e) {
                n.flags.remove(user_bits(flag));
            }
        }
        Ok(())
    }

    /// Show or hide `entity` and its subtree.
    pub fn set_visible(&mut self, entity: EntityId, visible: bool) -> Result<(), EcsError> {
        if visible {
            self.add_flag_recursive(entity, EntityFlags::VISIBLE)
        } else {
            self.remove_flag_recursive(entity, EntityFlags::VISIBLE)
        }
    }

    pub fn is_visible(&self, entity: EntityId) -> bool {
        self.flags(entity)
            .is_some_and(|f| f.contains(EntityFlags::VISIBLE))
    }

    // -- cloning ------------------------------------------------------------

    /// Deep-copy `entity` and its subtree into a new detached tree.
    ///
    /// Components are cloned, ids are reset to 0 and flags are not copied.
    pub fn clone_entity(&mut self, entity: EntityId) -> Result<EntityId, EcsError> {
        self.try_node(entity)?;
        let mut copy_root = None;
        let mut stack: Vec<(EntityId, Option<EntityId>)> = vec![(entity, None)];

        while let Some((src, dst_parent)) = stack.pop() {
            let Some(node) = self.node(src) else {
                continue;
            };
            let name = node.name.clone();
            let slots: Vec<ComponentSlot> = node
                .components
                .iter()
                .map(|s| ComponentSlot {
                    type_id: s.type_id,
                    value: s.value.clone_box(),
                })
                .collect();
            let children = node.children.clone();

            let dst = self.spawn_empty(&name);
            if let Some(n) = self.nodes[dst.index() as usize].as_mut() {
                n.components = slots;
                refresh_family(&mut self.families, n);
                n.parent = dst_parent;
            }
            match dst_parent {
                Some(p) => {
                    if let Some(pn) = self.node_mut(p) {
                        pn.children.push(dst);
                    }
                }
                None => copy_root = Some(dst),
            }
            stack.extend(children.into_iter().rev().map(|c| (c, Some(dst))));
        }

        copy_root.ok_or(EcsError::StaleEntity { entity })
    }

    // -- component queries over the tree ------------------------------------

    /// Children (or all descendants when `recursive`) of `entity` that hold
    /// a component of `type_id`, pre-order.
    pub fn children_with_component(
        &self,
        entity: EntityId,
        type_id: ComponentTypeId,
        recursive: bool,
    ) -> Vec<EntityId> {
        let candidates: Vec<EntityId> = if recursive {
            self.subtree(entity).into_iter().skip(1).collect()
        } else {
            self.children(entity).to_vec()
        };
        candidates
            .into_iter()
            .filter(|&e| self.component_count(e, type_id) > 0)
            .collect()
    }

    pub fn count_children_with_component(
        &self,
        entity: EntityId,
        type_id: ComponentTypeId,
        recursive: bool,
    ) -> usize {
        self.children_with_component(entity, type_id, recursive).len()
    }

    /// Every attached entity holding a component of `type_id`.
    pub fn entities_with_component(&self, type_id: ComponentTypeId) -> Vec<EntityId> {
        self.children_with_component(self.root, type_id, true)
    }

    // -- observers ----------------------------------------------------------

    /// Register a scene hook. Already attached entities are *not* replayed.
    pub fn add_observer(&mut self, observer: Box<dyn SceneObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> Option<Box<dyn SceneObserver>> {
        let pos = self.observers.iter().position(|(oid, _)| *oid == id)?;
        Some(self.observers.remove(pos).1)
    }

    /// Borrow a registered observer by concrete type.
    pub fn observer<T: SceneObserver>(&self, id: ObserverId) -> Option<&T> {
        self.observers
            .iter()
            .find(|(oid, _)| *oid == id)
            .and_then(|(_, obs)| obs.as_ref().as_any().downcast_ref::<T>())
    }

    pub fn observer_mut<T: SceneObserver>(&mut self, id: ObserverId) -> Option<&mut T> {
        self.observers
            .iter_mut()
            .find(|(oid, _)| *oid == id)
            .and_then(|(_, obs)| obs.as_mut().as_any_mut().downcast_mut::<T>())
    }

    // -- events -------------------------------------------------------------

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventDispatcher {
        &mut self.events
    }

    /// Forward a component state transition to subscribed handlers.
    ///
    /// Delivered immediately when `entity` is attached, otherwise cached
    /// until it is.
    pub fn raise_event(
        &mut self,
        entity: EntityId,
        component: ComponentTypeId,
        kind: EventKind,
    ) -> Result<(), EcsError> {
        let node = self.try_node(entity)?;
        if node.family.component_count(component) == 0 {
            return Err(EcsError::MissingComponent {
                entity,
                component: self.registry.name_of(component).to_owned(),
                index: 0,
            });
        }
        let event = SceneEvent {
            entity,
            component,
            kind,
        };
        if node.in_scene {
            self.events.deliver(event);
        } else {
            self.events.defer(event);
        }
        Ok(())
    }
}

/// `flag` without the transform bits.
fn user_bits(mut flag: EntityFlags) -> EntityFlags {
    flag.remove(EntityFlags::TRANSFORM_MASK);
    flag
}

/// Swap in the family matching `node`'s current component sequence.
fn refresh_family(families: &mut FamilyRegistry, node: &mut EntityNode) {
    let types: Vec<ComponentTypeId> = node.components.iter().map(|s| s.type_id).collect();
    let fresh = families.get_or_create(&types);
    let old = std::mem::replace(&mut node.family, fresh);
    families.release(old);
    debug_assert_eq!(node.family.types(), types.as_slice());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
