//! Interned component-shape metadata.
//!
//! A [`Family`] describes the *shape* of an entity's component sequence: which
//! component types are present, how many instances of each, and where the
//! first instance of each type sits in the (canonically sorted) sequence.
//! Most entities in a scene share one of a handful of shapes, so the
//! [`FamilyRegistry`] interns them: every entity with the same ordered
//! type sequence points at the same `Arc<Family>`.
//!
//! Acquisition ([`FamilyRegistry::get_or_create`]) and release
//! ([`FamilyRegistry::release`]) are the only entry points. Release consumes
//! the handle, so releasing twice is impossible by construction; the last
//! release removes the entry from the intern table.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::component::{ComponentMask, ComponentTypeId};

// ---------------------------------------------------------------------------
// Family
// ---------------------------------------------------------------------------

/// Immutable description of one component-type shape.
#[derive(Debug, PartialEq, Eq)]
pub struct Family {
    /// The canonical (sorted) type sequence this family was built from.
    types: Box<[ComponentTypeId]>,
    /// Instances per type, indexed by `ComponentTypeId::index()`.
    counts: Box<[u32]>,
    /// Slot of the first instance per type, indexed like `counts`.
    first_index: Box<[u32]>,
    mask: ComponentMask,
}

impl Family {
    /// Build the per-type tables from a canonically sorted sequence.
    fn build(types: &[ComponentTypeId]) -> Self {
        debug_assert!(
            types.windows(2).all(|w| w[0] <= w[1]),
            "family key must be canonically sorted: {types:?}"
        );

        let width = types.iter().map(|t| t.index() + 1).max().unwrap_or(0);
        let mut counts = vec![0u32; width];
        let mut first_index = vec![0u32; width];
        let mut mask = ComponentMask::EMPTY;

        for (slot, &t) in types.iter().enumerate() {
            let i = t.index();
            if counts[i] == 0 {
                first_index[i] = slot as u32;
            }
            counts[i] += 1;
            mask.insert(t);
        }

        Self {
            types: types.into(),
            counts: counts.into_boxed_slice(),
            first_index: first_index.into_boxed_slice(),
            mask,
        }
    }

    /// Number of instances of `type_id` on an entity of this shape.
    #[inline]
    pub fn component_count(&self, type_id: ComponentTypeId) -> u32 {
        self.counts.get(type_id.index()).copied().unwrap_or(0)
    }

    /// Slot in the component sequence of the `index`-th instance of
    /// `type_id`, or `None` if there are not that many instances.
    #[inline]
    pub fn component_index(&self, type_id: ComponentTypeId, index: u32) -> Option<usize> {
        let i = type_id.index();
        let count = self.counts.get(i).copied().unwrap_or(0);
        (index < count).then(|| (self.first_index[i] + index) as usize)
    }

    /// Set of types present.
    #[inline]
    pub fn mask(&self) -> ComponentMask {
        self.mask
    }

    /// The canonical type sequence.
    #[inline]
    pub fn types(&self) -> &[ComponentTypeId] {
        &self.types
    }

    /// Total number of component slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FamilyRegistry
// ---------------------------------------------------------------------------

/// Lifetime counters for the intern table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FamilyStats {
    /// Families built since the registry was created.
    pub created: u64,
    /// Families removed after their last release.
    pub destroyed: u64,
}

/// Intern table mapping a canonical type sequence to its live [`Family`].
///
/// Owned by a [`World`](crate::world::World), so independent worlds never
/// share state.
#[derive(Debug, Default)]
pub struct FamilyRegistry {
    table: HashMap<Box<[ComponentTypeId]>, Weak<Family>>,
    stats: FamilyStats,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the interned family for `types`, creating it on a miss.
    ///
    /// `types` must already be in canonical order.
    pub fn get_or_create(&mut self, types: &[ComponentTypeId]) -> Arc<Family> {
        if let Some(existing) = self.table.get(types).and_then(Weak::upgrade) {
            return existing;
        }

        let family = Arc::new(Family::build(types));
        self.table.insert(types.into(), Arc::downgrade(&family));
        self.stats.created += 1;
        tracing::trace!(?types, live = self.table.len(), "family created");
        family
    }

    /// Give back one reference. The last reference removes the family from
    /// the table.
    pub fn release(&mut self, family: Arc<Family>) {
        if Arc::strong_count(&family) > 1 {
            return;
        }
        let removed = self.table.remove(family.types());
        debug_assert!(
            removed.is_some(),
            "released family {:?} was not interned",
            family.types()
        );
        self.stats.destroyed += 1;
        tracing::trace!(types = ?family.types(), live = self.table.len(), "family destroyed");
    }

    /// Whether a live family exists for `types`.
    pub fn contains(&self, types: &[ComponentTypeId]) -> bool {
        self.table
            .get(types)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Number of live families.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stats(&self) -> FamilyStats {
        self.stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: u32) -> ComponentTypeId {
        ComponentTypeId(i)
    }

    #[test]
    fn equal_sequences_share_one_family() {
        let mut reg = FamilyRegistry::new();
        let a = reg.get_or_create(&[t(0), t(2)]);
        let b = reg.get_or_create(&[t(0), t(2)]);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.stats().created, 1);
    }

    #[test]
    fn different_counts_are_distinct() {
        let mut reg = FamilyRegistry::new();
        let a = reg.get_or_create(&[t(1)]);
        let b = reg.get_or_create(&[t(1), t(1)]);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn tables_describe_duplicates() {
        let mut reg = FamilyRegistry::new();
        let f = reg.get_or_create(&[t(0), t(3), t(3), t(3), t(5)]);
        assert_eq!(f.component_count(t(3)), 3);
        assert_eq!(f.component_index(t(3), 0), Some(1));
        assert_eq!(f.component_index(t(3), 2), Some(3));
        assert_eq!(f.component_index(t(3), 3), None);
        assert_eq!(f.component_index(t(5), 0), Some(4));
        assert_eq!(f.component_count(t(4)), 0);
        assert_eq!(f.component_count(t(100)), 0);
        assert_eq!(f.component_index(t(100), 0), None);
        assert_eq!(f.mask(), ComponentMask::from_types(&[t(0), t(3), t(5)]));
    }

    #[test]
    fn last_release_removes_entry() {
        let mut reg = FamilyRegistry::new();
        let a = reg.get_or_create(&[t(0)]);
        let b = reg.get_or_create(&[t(0)]);

        reg.release(a);
        assert!(reg.contains(&[t(0)]));
        assert_eq!(reg.stats().destroyed, 0);

        reg.release(b);
        assert!(!reg.contains(&[t(0)]));
        assert!(reg.is_empty());
        assert_eq!(reg.stats(), FamilyStats { created: 1, destroyed: 1 });
    }

    #[test]
    fn recreated_after_full_release() {
        let mut reg = FamilyRegistry::new();
        let a = reg.get_or_create(&[t(2)]);
        reg.release(a);
        let b = reg.get_or_create(&[t(2)]);
        assert_eq!(reg.stats().created, 2);
        assert_eq!(b.component_count(t(2)), 1);
    }

    #[test]
    fn empty_shape_is_interned() {
        let mut reg = FamilyRegistry::new();
        let a = reg.get_or_create(&[]);
        let b = reg.get_or_create(&[]);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_empty());
        assert!(a.mask().is_empty());
    }
}
