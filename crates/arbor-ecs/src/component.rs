//! Component type registration, canonical ordering, and capability masks.
//!
//! Every component kind stored on an entity must be registered in a
//! [`ComponentRegistry`]. Registration produces a [`ComponentTypeId`] which
//! doubles as the kind's position in the *canonical order* (the total order
//! used to sort every entity's component sequence) and as its bit in a
//! [`ComponentMask`].
//!
//! The registry also carries the component factory: a way to construct a
//! default-initialised component given only its type, used by
//! [`World::get_or_create_component`](crate::world::World::get_or_create_component).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::EcsError;

/// Width of a [`ComponentMask`]. Registering more component kinds than this
/// is a programming error.
pub const MAX_COMPONENT_TYPES: usize = 128;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A typed, mutable data block owned by exactly one entity.
///
/// Implemented automatically for every `Clone + Debug + Send + Sync + 'static`
/// type. Components are stored boxed; ownership moves into the entity on
/// attach and back out to the caller on detach, so a component can never be
/// held by two entities at once.
pub trait Component: Any + fmt::Debug + Send + Sync {
    /// Clone into a fresh box. Used by entity cloning.
    fn clone_box(&self) -> Box<dyn Component>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T> Component for T
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn clone_box(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
///
/// Ordering on this type *is* the canonical component order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Position of this type in the canonical order.
    #[inline]
    pub fn sorted_id(self) -> u32 {
        self.0
    }

    /// Bit index of this type in a [`ComponentMask`].
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentMask
// ---------------------------------------------------------------------------

/// Fixed-width set of component types.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u128);

impl ComponentMask {
    pub const EMPTY: Self = Self(0);

    /// A mask containing exactly the given types.
    pub fn from_types(types: &[ComponentTypeId]) -> Self {
        let mut mask = Self::EMPTY;
        for &t in types {
            mask.insert(t);
        }
        mask
    }

    #[inline]
    pub fn insert(&mut self, type_id: ComponentTypeId) {
        self.0 |= 1u128 << type_id.index();
    }

    #[inline]
    pub fn remove(&mut self, type_id: ComponentTypeId) {
        self.0 &= !(1u128 << type_id.index());
    }

    #[inline]
    pub fn contains(self, type_id: ComponentTypeId) -> bool {
        self.0 & (1u128 << type_id.index()) != 0
    }

    /// Whether every type in `other` is also in `self`.
    #[inline]
    pub fn contains_all(self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of distinct types in the mask.
    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn union(self, other: ComponentMask) -> Self {
        Self(self.0 | other.0)
    }

    pub fn intersection(self, other: ComponentMask) -> Self {
        Self(self.0 & other.0)
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentMask({:#x})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller).
    pub name: String,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

/// Constructs a default-initialised component of one kind.
pub type ComponentFactory = Box<dyn Fn() -> Box<dyn Component> + Send + Sync>;

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s, their metadata and
/// their factories.
///
/// A type can only be registered once; subsequent registrations of the same
/// Rust `TypeId` return the existing [`ComponentTypeId`].
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Name -> ComponentTypeId for lookup by string name.
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
    /// Indexed by ComponentTypeId.0.
    factories: Vec<Option<ComponentFactory>>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("infos", &self.infos)
            .field(
                "factories",
                &self.factories.iter().filter(|f| f.is_some()).count(),
            )
            .finish()
    }
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            infos: Vec::new(),
            factories: Vec::new(),
        }
    }

    /// Register a component type under the given `name`.
    ///
    /// If the type has already been registered, the existing
    /// [`ComponentTypeId`] is returned and `name` is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken by a different type, or if more than
    /// [`MAX_COMPONENT_TYPES`] kinds are registered.
    pub fn register<T: Component>(&mut self, name: &str) -> ComponentTypeId {
        match self.try_register::<T>(name) {
            Ok(id) => id,
            Err(err) => panic!("cannot register '{name}': {err}"),
        }
    }

    /// Like [`register`](Self::register), but reports a full mask as an
    /// error instead of panicking.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already taken by a different type.
    pub fn try_register<T: Component>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if self.by_name.contains_key(name) {
            panic!(
                "component name '{}' is already registered for a different type",
                name
            );
        }
        if self.infos.len() >= MAX_COMPONENT_TYPES {
            return Err(EcsError::TooManyComponentTypes {
                max: MAX_COMPONENT_TYPES,
            });
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            type_id: rust_type_id,
        });
        self.factories.push(None);
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        tracing::trace!(name, ?id, "registered component type");
        Ok(id)
    }

    /// Register a component type and install `T::default` as its factory.
    pub fn register_with_default<T: Component + Default>(&mut self, name: &str) -> ComponentTypeId {
        let id = self.register::<T>(name);
        self.set_factory(id, Box::new(|| Box::new(T::default())));
        id
    }

    /// Install (or replace) the factory for a registered type.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this registry.
    pub fn set_factory(&mut self, id: ComponentTypeId, factory: ComponentFactory) {
        let slot = self
            .factories
            .get_mut(id.index())
            .unwrap_or_else(|| panic!("{id:?} is not registered"));
        *slot = Some(factory);
    }

    /// Construct a default instance of `id`, if a factory is installed.
    pub fn create(&self, id: ComponentTypeId) -> Option<Box<dyn Component>> {
        self.factories
            .get(id.index())
            .and_then(|f| f.as_ref())
            .map(|f| f())
    }

    /// Whether `id` has a factory.
    pub fn has_factory(&self, id: ComponentTypeId) -> bool {
        matches!(self.factories.get(id.index()), Some(Some(_)))
    }

    /// Look up a component type by its Rust type.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up the registered type of a boxed component instance.
    pub fn lookup_dyn(&self, component: &dyn Component) -> Option<ComponentTypeId> {
        self.by_type.get(&component.as_any().type_id()).copied()
    }

    /// Look up a component type by its registered string name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn get_info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    /// Registered name of `id`, or `"<unregistered>"`.
    pub fn name_of(&self, id: ComponentTypeId) -> &str {
        self.get_info(id).map_or("<unregistered>", |i| i.name.as_str())
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    /// Mask for a single Rust type, if registered.
    pub fn mask_of<T: 'static>(&self) -> Option<ComponentMask> {
        self.lookup::<T>().map(|id| ComponentMask::from_types(&[id]))
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register::<Pos>("position");
        assert_eq!(reg.lookup::<Pos>(), Some(id));
        assert_eq!(reg.lookup_by_name("position"), Some(id));
    }

    #[test]
    fn same_type_same_id() {
        let mut reg = ComponentRegistry::new();
        let id1 = reg.register::<Pos>("position");
        let id2 = reg.register::<Pos>("position_again");
        assert_eq!(id1, id2);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn name_collision_panics() {
        let mut reg = ComponentRegistry::new();
        reg.register::<Pos>("thing");
        reg.register::<Vel>("thing");
    }

    #[test]
    fn registration_order_is_canonical_order() {
        let mut reg = ComponentRegistry::new();
        let p = reg.register::<Pos>("position");
        let v = reg.register::<Vel>("velocity");
        assert!(p < v);
        assert_eq!(p.sorted_id(), 0);
        assert_eq!(v.sorted_id(), 1);
    }

    #[test]
    fn lookup_dyn_resolves_boxed_instance() {
        let mut reg = ComponentRegistry::new();
        let v = reg.register::<Vel>("velocity");
        let boxed: Box<dyn Component> = Box::new(Vel { dx: 1.0, dy: 0.0 });
        assert_eq!(reg.lookup_dyn(boxed.as_ref()), Some(v));
    }

    #[test]
    fn factory_creates_default_instance() {
        let mut reg = ComponentRegistry::new();
        let p = reg.register_with_default::<Pos>("position");
        let v = reg.register::<Vel>("velocity");

        let made = reg.create(p).unwrap();
        assert_eq!(made.as_any().downcast_ref::<Pos>(), Some(&Pos::default()));
        assert!(reg.create(v).is_none());
        assert!(!reg.has_factory(v));
    }

    #[test]
    fn custom_factory_replaces_default() {
        let mut reg = ComponentRegistry::new();
        let v = reg.register::<Vel>("velocity");
        reg.set_factory(v, Box::new(|| Box::new(Vel { dx: 9.0, dy: 9.0 })));
        let made = reg.create(v).unwrap();
        assert_eq!(
            made.as_any().downcast_ref::<Vel>(),
            Some(&Vel { dx: 9.0, dy: 9.0 })
        );
    }

    #[test]
    fn registering_past_mask_width_fails() {
        #[derive(Debug, Clone)]
        struct Slot<const N: usize>;

        macro_rules! fill {
            ($reg:expr, $($n:literal)*) => {
                $( $reg.register::<Slot<$n>>(concat!("slot", $n)); )*
            };
        }

        let mut reg = ComponentRegistry::new();
        fill!(reg, 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26
            27 28 29 30 31 32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52
            53 54 55 56 57 58 59 60 61 62 63 64 65 66 67 68 69 70 71 72 73 74 75 76 77 78
            79 80 81 82 83 84 85 86 87 88 89 90 91 92 93 94 95 96 97 98 99 100 101 102 103
            104 105 106 107 108 109 110 111 112 113 114 115 116 117 118 119 120 121 122 123
            124 125 126 127);
        assert_eq!(reg.len(), MAX_COMPONENT_TYPES);

        let err = reg.try_register::<Pos>("position").unwrap_err();
        assert!(matches!(err, EcsError::TooManyComponentTypes { max: 128 }));
    }

    #[test]
    fn mask_operations() {
        let mut reg = ComponentRegistry::new();
        let p = reg.register::<Pos>("position");
        let v = reg.register::<Vel>("velocity");

        let both = ComponentMask::from_types(&[p, v]);
        let only_p = reg.mask_of::<Pos>().unwrap();
        assert!(both.contains_all(only_p));
        assert!(!only_p.contains_all(both));
        assert_eq!(both.len(), 2);

        let mut m = both;
        m.remove(v);
        assert_eq!(m, only_p);
        assert_eq!(both.intersection(only_p), only_p);
        assert_eq!(only_p.union(ComponentMask::from_types(&[v])), both);
        assert!(ComponentMask::EMPTY.is_empty());
    }
}
