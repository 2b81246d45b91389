//! Read-only accessors: counts, index and name lookup, names, positions, parents.
//!
//! Index lookups return `OutOfRange` past the end and `NotFound` for an
//! unknown parent. Name lookups scan the parent's child list in order and
//! return the first match.

use tether_common::{ENGINE_NAME, EntityKind, Identity, RegistryError};

use crate::manager::EntityManager;

impl EntityManager {
    fn child_count(&self, parent: Identity, kind: EntityKind) -> Result<usize, RegistryError> {
        if !self.exists(parent) {
            return Err(RegistryError::not_found(parent));
        }
        Ok(self.hierarchy.children(parent, kind).len())
    }

    /// The `index`th child of `kind` under `parent`.
    pub fn identity_at(
        &self,
        parent: Identity,
        kind: EntityKind,
        index: usize,
    ) -> Result<Identity, RegistryError> {
        if !self.exists(parent) {
            return Err(RegistryError::not_found(parent));
        }
        let children = self.hierarchy.children(parent, kind);
        children
            .get(index)
            .copied()
            .ok_or(RegistryError::OutOfRange {
                kind,
                index,
                count: children.len(),
            })
    }

    fn child_named(
        &self,
        parent: Identity,
        kind: EntityKind,
        name: &str,
    ) -> Result<Identity, RegistryError> {
        if !self.exists(parent) {
            return Err(RegistryError::not_found(parent));
        }
        self.hierarchy
            .children(parent, kind)
            .iter()
            .copied()
            .find(|c| self.name(*c).is_ok_and(|n| n == name))
            .ok_or_else(|| RegistryError::NameNotFound {
                kind,
                name: name.to_string(),
            })
    }

    /// Name of any entity.
    pub fn name(&self, id: Identity) -> Result<&str, RegistryError> {
        let name = match id.kind() {
            EntityKind::Engine if id == Identity::ENGINE => Some(ENGINE_NAME),
            EntityKind::Engine => None,
            EntityKind::World => self.worlds.get(id).map(|r| r.name.as_str()),
            EntityKind::Model => self.models.get(id).map(|r| r.name.as_str()),
            EntityKind::Link => self.links.get(id).map(|r| r.name.as_str()),
            EntityKind::Joint => self.joints.get(id).map(|r| r.name.as_str()),
            EntityKind::Shape => self.collisions.get(id).map(|r| r.name.as_str()),
        };
        name.ok_or_else(|| RegistryError::not_found(id))
    }

    /// Position of `id` among its same-kind siblings. Not stable across removals.
    pub fn index_of(&self, id: Identity) -> Result<usize, RegistryError> {
        if !self.exists(id) {
            return Err(RegistryError::not_found(id));
        }
        if id == Identity::ENGINE {
            return Ok(0);
        }
        self.hierarchy
            .position(id)
            .ok_or_else(|| RegistryError::Inconsistent(format!("{id} has no hierarchy entry")))
    }

    /// Owning entity of `id`. The engine has no parent.
    pub fn parent_of(&self, id: Identity) -> Result<Identity, RegistryError> {
        if !self.exists(id) || id == Identity::ENGINE {
            return Err(RegistryError::not_found(id));
        }
        let parent = self
            .hierarchy
            .parent_of(id)
            .ok_or_else(|| RegistryError::Inconsistent(format!("{id} has no hierarchy entry")))?;
        debug_assert!(self.exists(parent), "{id} has dangling parent {parent}");
        Ok(parent)
    }

    fn typed_parent(&self, id: Identity, kind: EntityKind) -> Result<Identity, RegistryError> {
        self.require(id, kind)?;
        self.parent_of(id)
    }

    fn typed_index(&self, id: Identity, kind: EntityKind) -> Result<usize, RegistryError> {
        self.require(id, kind)?;
        self.index_of(id)
    }

    fn typed_name(&self, id: Identity, kind: EntityKind) -> Result<&str, RegistryError> {
        self.require(id, kind)?;
        self.name(id)
    }

    // --- Engine ---
    pub fn engine_name(&self, engine: Identity) -> Result<&str, RegistryError> {
        self.typed_name(engine, EntityKind::Engine)
    }

    pub fn engine_index(&self, engine: Identity) -> Result<usize, RegistryError> {
        self.typed_index(engine, EntityKind::Engine)
    }

    pub fn world_count(&self, engine: Identity) -> Result<usize, RegistryError> {
        self.require(engine, EntityKind::Engine)?;
        self.child_count(engine, EntityKind::World)
    }

    pub fn world(&self, engine: Identity, index: usize) -> Result<Identity, RegistryError> {
        self.require(engine, EntityKind::Engine)?;
        self.identity_at(engine, EntityKind::World, index)
    }

    pub fn world_by_name(&self, engine: Identity, name: &str) -> Result<Identity, RegistryError> {
        self.require(engine, EntityKind::Engine)?;
        self.child_named(engine, EntityKind::World, name)
    }

    // --- World ---
    pub fn world_name(&self, world: Identity) -> Result<&str, RegistryError> {
        self.typed_name(world, EntityKind::World)
    }

    pub fn world_index(&self, world: Identity) -> Result<usize, RegistryError> {
        self.typed_index(world, EntityKind::World)
    }

    pub fn engine_of_world(&self, world: Identity) -> Result<Identity, RegistryError> {
        self.typed_parent(world, EntityKind::World)
    }

    pub fn model_count(&self, world: Identity) -> Result<usize, RegistryError> {
        self.require(world, EntityKind::World)?;
        self.child_count(world, EntityKind::Model)
    }

    pub fn model(&self, world: Identity, index: usize) -> Result<Identity, RegistryError> {
        self.require(world, EntityKind::World)?;
        self.identity_at(world, EntityKind::Model, index)
    }

    pub fn model_by_name(&self, world: Identity, name: &str) -> Result<Identity, RegistryError> {
        self.require(world, EntityKind::World)?;
        self.child_named(world, EntityKind::Model, name)
    }

    // --- Model ---
    pub fn model_name(&self, model: Identity) -> Result<&str, RegistryError> {
        self.typed_name(model, EntityKind::Model)
    }

    pub fn model_index(&self, model: Identity) -> Result<usize, RegistryError> {
        self.typed_index(model, EntityKind::Model)
    }

    pub fn world_of_model(&self, model: Identity) -> Result<Identity, RegistryError> {
        self.typed_parent(model, EntityKind::Model)
    }

    /// Nested models are not supported; always zero for a live model.
    pub fn nested_model_count(&self, model: Identity) -> Result<usize, RegistryError> {
        self.require(model, EntityKind::Model)?;
        Ok(0)
    }

    pub fn link_count(&self, model: Identity) -> Result<usize, RegistryError> {
        self.require(model, EntityKind::Model)?;
        self.child_count(model, EntityKind::Link)
    }

    pub fn link(&self, model: Identity, index: usize) -> Result<Identity, RegistryError> {
        self.require(model, EntityKind::Model)?;
        self.identity_at(model, EntityKind::Link, index)
    }

    pub fn link_by_name(&self, model: Identity, name: &str) -> Result<Identity, RegistryError> {
        self.require(model, EntityKind::Model)?;
        self.child_named(model, EntityKind::Link, name)
    }

    pub fn joint_count(&self, model: Identity) -> Result<usize, RegistryError> {
        self.require(model, EntityKind::Model)?;
        self.child_count(model, EntityKind::Joint)
    }

    pub fn joint(&self, model: Identity, index: usize) -> Result<Identity, RegistryError> {
        self.require(model, EntityKind::Model)?;
        self.identity_at(model, EntityKind::Joint, index)
    }

    pub fn joint_by_name(&self, model: Identity, name: &str) -> Result<Identity, RegistryError> {
        self.require(model, EntityKind::Model)?;
        self.child_named(model, EntityKind::Joint, name)
    }

    // --- Link ---
    pub fn link_name(&self, link: Identity) -> Result<&str, RegistryError> {
        self.typed_name(link, EntityKind::Link)
    }

    pub fn link_index(&self, link: Identity) -> Result<usize, RegistryError> {
        self.typed_index(link, EntityKind::Link)
    }

    pub fn model_of_link(&self, link: Identity) -> Result<Identity, RegistryError> {
        self.typed_parent(link, EntityKind::Link)
    }

    pub fn shape_count(&self, link: Identity) -> Result<usize, RegistryError> {
        self.require(link, EntityKind::Link)?;
        self.child_count(link, EntityKind::Shape)
    }

    pub fn shape(&self, link: Identity, index: usize) -> Result<Identity, RegistryError> {
        self.require(link, EntityKind::Link)?;
        self.identity_at(link, EntityKind::Shape, index)
    }

    pub fn shape_by_name(&self, link: Identity, name: &str) -> Result<Identity, RegistryError> {
        self.require(link, EntityKind::Link)?;
        self.child_named(link, EntityKind::Shape, name)
    }

    // --- Joint ---
    pub fn joint_name(&self, joint: Identity) -> Result<&str, RegistryError> {
        self.typed_name(joint, EntityKind::Joint)
    }

    pub fn joint_index(&self, joint: Identity) -> Result<usize, RegistryError> {
        self.typed_index(joint, EntityKind::Joint)
    }

    pub fn model_of_joint(&self, joint: Identity) -> Result<Identity, RegistryError> {
        self.typed_parent(joint, EntityKind::Joint)
    }

    /// (parent link, child link) of a joint.
    pub fn joint_links(&self, joint: Identity) -> Result<(Identity, Identity), RegistryError> {
        self.require(joint, EntityKind::Joint)?;
        self.joints
            .get(joint)
            .map(|j| (j.parent_link, j.child_link))
            .ok_or_else(|| RegistryError::not_found(joint))
    }

    // --- Shape ---
    pub fn shape_name(&self, shape: Identity) -> Result<&str, RegistryError> {
        self.typed_name(shape, EntityKind::Shape)
    }

    pub fn shape_index(&self, shape: Identity) -> Result<usize, RegistryError> {
        self.typed_index(shape, EntityKind::Shape)
    }

    pub fn link_of_shape(&self, shape: Identity) -> Result<Identity, RegistryError> {
        self.typed_parent(shape, EntityKind::Shape)
    }
}
