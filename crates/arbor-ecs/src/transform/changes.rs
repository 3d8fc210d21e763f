//! Per-scene transform change lists.

use crate::entity::EntityId;

/// Entities whose world transform may be stale, grouped by cause.
///
/// Only attached entities are ever queued. Detaching or destroying an
/// entity erases it from every list. Duplicates are allowed; propagation
/// treats a repeated entry as a no-op.
#[derive(Debug, Default, Clone)]
pub struct TransformChanges {
    /// Local matrix was written.
    pub(crate) local_changed: Vec<EntityId>,
    /// Entity was (re)attached or gained a transform.
    pub(crate) parent_changed: Vec<EntityId>,
    /// Animation offset was written.
    pub(crate) animation_changed: Vec<EntityId>,
}

impl TransformChanges {
    pub fn local_changed(&self) -> &[EntityId] {
        &self.local_changed
    }

    pub fn parent_changed(&self) -> &[EntityId] {
        &self.parent_changed
    }

    pub fn animation_changed(&self) -> &[EntityId] {
        &self.animation_changed
    }

    /// Total queued entries across the three lists.
    pub fn len(&self) -> usize {
        self.local_changed.len() + self.parent_changed.len() + self.animation_changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `entity` is queued in any list.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.local_changed.contains(&entity)
            || self.parent_changed.contains(&entity)
            || self.animation_changed.contains(&entity)
    }

    pub(crate) fn erase(&mut self, entity: EntityId) {
        self.local_changed.retain(|&e| e != entity);
        self.parent_changed.retain(|&e| e != entity);
        self.animation_changed.retain(|&e| e != entity);
    }

    /// Move every entry into `out` (local, then parent, then animation) and
    /// leave the lists empty.
    pub(crate) fn drain_into(&mut self, out: &mut Vec<EntityId>) {
        out.append(&mut self.local_changed);
        out.append(&mut self.parent_changed);
        out.append(&mut self.animation_changed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erase_removes_from_every_list() {
        let e = EntityId::new(3, 0);
        let other = EntityId::new(4, 0);
        let mut changes = TransformChanges::default();
        changes.local_changed.extend([e, other, e]);
        changes.parent_changed.push(e);
        changes.animation_changed.push(e);

        changes.erase(e);
        assert!(!changes.contains(e));
        assert_eq!(changes.local_changed(), &[other]);
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn drain_empties_lists() {
        let mut changes = TransformChanges::default();
        changes.local_changed.push(EntityId::new(1, 0));
        changes.animation_changed.push(EntityId::new(2, 0));
        let mut out = Vec::new();
        changes.drain_into(&mut out);
        assert_eq!(out, vec![EntityId::new(1, 0), EntityId::new(2, 0)]);
        assert!(changes.is_empty());
    }
}
