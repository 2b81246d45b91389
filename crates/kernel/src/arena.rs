//! Identity registry: one generational arena per entity kind.

use tether_common::{EntityKind, Identity};

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Records of one kind, addressed by [`Identity`].
///
/// Removing a record bumps its slot's generation before the slot is recycled,
/// so identities handed out earlier stop resolving.
#[derive(Debug)]
pub struct Arena<T> {
    kind: EntityKind,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store a record and generate its identity.
    pub fn insert(&mut self, value: T) -> Identity {
        self.len += 1;
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.value = Some(value);
            return Identity::new(self.kind, slot, entry.generation);
        }
        assert!(
            self.slots.len() < u32::MAX as usize,
            "{} arena exhausted",
            self.kind
        );
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Identity::new(self.kind, slot, 0)
    }

    fn slot(&self, id: Identity) -> Option<&Slot<T>> {
        if id.kind() != self.kind {
            return None;
        }
        self.slots
            .get(id.slot() as usize)
            .filter(|s| s.generation == id.generation())
    }

    pub fn contains(&self, id: Identity) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: Identity) -> Option<&T> {
        self.slot(id).and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: Identity) -> Option<&mut T> {
        if id.kind() != self.kind {
            return None;
        }
        self.slots
            .get_mut(id.slot() as usize)
            .filter(|s| s.generation == id.generation())
            .and_then(|s| s.value.as_mut())
    }

    /// Take a record out. The identity is dead afterwards.
    pub fn remove(&mut self, id: Identity) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let entry = &mut self.slots[id.slot() as usize];
        let value = entry.value.take();
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.slot());
        self.len -= 1;
        value
    }

    /// Take a record out only if `release` accepts it.
    ///
    /// A record handed back through `Err` returns to its slot untouched, so
    /// its identity stays live. `None` if `id` does not resolve.
    pub fn remove_with<E>(
        &mut self,
        id: Identity,
        release: impl FnOnce(T) -> Result<(), (T, E)>,
    ) -> Option<Result<(), E>> {
        if !self.contains(id) {
            return None;
        }
        let entry = &mut self.slots[id.slot() as usize];
        let value = entry.value.take()?;
        match release(value) {
            Ok(()) => {
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(id.slot());
                self.len -= 1;
                Some(Ok(()))
            }
            Err((value, err)) => {
                entry.value = Some(value);
                Some(Err(err))
            }
        }
    }

    /// Live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Identity, &T)> {
        let kind = self.kind;
        self.slots.iter().enumerate().filter_map(move |(i, s)| {
            s.value
                .as_ref()
                .map(|v| (Identity::new(kind, i as u32, s.generation), v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut arena = Arena::new(EntityKind::Model);
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(a.kind(), EntityKind::Model);
    }

    #[test]
    fn stale_identity_does_not_resolve_after_reuse() {
        let mut arena = Arena::new(EntityKind::Link);
        let old = arena.insert(1);
        assert_eq!(arena.remove(old), Some(1));
        let new = arena.insert(2);
        assert_eq!(new.slot(), old.slot());
        assert_ne!(new, old);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn double_remove_returns_none() {
        let mut arena = Arena::new(EntityKind::Joint);
        let id = arena.insert(());
        assert!(arena.remove(id).is_some());
        assert!(arena.remove(id).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn other_kinds_never_resolve() {
        let mut arena = Arena::new(EntityKind::Model);
        let id = arena.insert(5);
        let foreign = Identity::new(EntityKind::Link, id.slot(), id.generation());
        assert!(!arena.contains(foreign));
        assert!(arena.get_mut(foreign).is_none());
        assert!(arena.remove(foreign).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn rejected_release_keeps_the_record() {
        let mut arena = Arena::new(EntityKind::Link);
        let id = arena.insert(String::from("body"));

        let refused = arena.remove_with(id, |value| Err((value, "still constrained")));
        assert_eq!(refused, Some(Err("still constrained")));
        assert_eq!(arena.get(id).map(String::as_str), Some("body"));
        assert_eq!(arena.len(), 1);

        let mut seen = None;
        let accepted = arena.remove_with(id, |value| {
            seen = Some(value);
            Ok::<(), (String, ())>(())
        });
        assert_eq!(accepted, Some(Ok(())));
        assert_eq!(seen.as_deref(), Some("body"));
        assert!(!arena.contains(id));
        assert!(arena.remove_with(id, |v| Err((v, ()))).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn iter_skips_removed() {
        let mut arena = Arena::new(EntityKind::Shape);
        let a = arena.insert('a');
        let b = arena.insert('b');
        let c = arena.insert('c');
        arena.remove(b);
        let ids: Vec<Identity> = arena.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c]);
    }
}
