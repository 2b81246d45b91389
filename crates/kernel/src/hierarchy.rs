//! Hierarchy index: child → parent, plus ordered child lists per parent and kind.

use std::collections::BTreeMap;
use tether_common::{EntityKind, Identity};

/// Ownership relation between entities.
///
/// Child lists keep insertion order. A child's index is its position among
/// same-kind siblings, so indices shift down when an earlier sibling goes.
#[derive(Debug, Default, Clone)]
pub struct Hierarchy {
    parents: BTreeMap<Identity, Identity>,
    children: BTreeMap<(Identity, EntityKind), Vec<Identity>>,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Record `child` under `parent`. Returns false if `child` already had an entry.
    pub fn insert(&mut self, child: Identity, parent: Identity) -> bool {
        if self.parents.contains_key(&child) {
            return false;
        }
        self.parents.insert(child, parent);
        self.children
            .entry((parent, child.kind()))
            .or_default()
            .push(child);
        true
    }

    /// Erase `child`'s entry. Returns the parent it was recorded under.
    pub fn remove(&mut self, child: Identity) -> Option<Identity> {
        let parent = self.parents.remove(&child)?;
        let key = (parent, child.kind());
        if let Some(list) = self.children.get_mut(&key) {
            list.retain(|c| *c != child);
            if list.is_empty() {
                self.children.remove(&key);
            }
        }
        Some(parent)
    }

    pub fn parent_of(&self, child: Identity) -> Option<Identity> {
        self.parents.get(&child).copied()
    }

    pub fn children(&self, parent: Identity, kind: EntityKind) -> &[Identity] {
        self.children
            .get(&(parent, kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Position of `child` among its same-kind siblings.
    pub fn position(&self, child: Identity) -> Option<usize> {
        let parent = self.parent_of(child)?;
        self.children(parent, child.kind())
            .iter()
            .position(|c| *c == child)
    }

    /// All (child, parent) pairs in identity order.
    pub fn entries(&self) -> impl Iterator<Item = (Identity, Identity)> + '_ {
        self.parents.iter().map(|(c, p)| (*c, *p))
    }
}
