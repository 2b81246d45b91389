use tether_common::{EntityKind, Identity, RegistryError};
use tether_solver::{
    CollisionAlgorithm, CollisionShape, JointDesc, RigidBodyDesc, SolverConfig, SolverWorld,
};

use crate::arena::Arena;
use crate::hierarchy::Hierarchy;
use crate::records::{CollisionRecord, JointRecord, LinkRecord, ModelRecord, WorldRecord};

/// Registry of every entity under one engine.
///
/// Mutations take `&mut self` and reads take `&self`, so a removal can never
/// interleave with a read on the same manager. No locking is done here;
/// sharing across threads is the caller's business.
#[derive(Debug)]
pub struct EntityManager {
    pub(crate) worlds: Arena<WorldRecord>,
    pub(crate) models: Arena<ModelRecord>,
    pub(crate) links: Arena<LinkRecord>,
    pub(crate) collisions: Arena<CollisionRecord>,
    pub(crate) joints: Arena<JointRecord>,
    pub(crate) hierarchy: Hierarchy,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityManager {
    pub fn new() -> Self {
        Self {
            worlds: Arena::new(EntityKind::World),
            models: Arena::new(EntityKind::Model),
            links: Arena::new(EntityKind::Link),
            collisions: Arena::new(EntityKind::Shape),
            joints: Arena::new(EntityKind::Joint),
            hierarchy: Hierarchy::new(),
        }
    }

    /// Identity of the engine root.
    pub fn engine(&self) -> Identity {
        Identity::ENGINE
    }

    /// Build an empty world with default solver settings.
    pub fn construct_empty_world(
        &mut self,
        engine: Identity,
        name: impl Into<String>,
    ) -> Result<Identity, RegistryError> {
        self.construct_world(engine, name, &SolverConfig::default())
    }

    /// Build a world whose solver uses `config`.
    ///
    /// Concave and compound narrow-phase support is always registered, and the
    /// global CFM is always zero regardless of `config`.
    pub fn construct_world(
        &mut self,
        engine: Identity,
        name: impl Into<String>,
        config: &SolverConfig,
    ) -> Result<Identity, RegistryError> {
        self.require(engine, EntityKind::Engine)?;
        let name = name.into();

        let mut solver = SolverWorld::new(config);
        solver.dynamics_mut().solver_info_mut().global_cfm = 0.0;
        solver
            .dispatcher_mut()
            .register_algorithm(CollisionAlgorithm::GImpactConcave);

        let id = self.worlds.insert(WorldRecord {
            name: name.clone(),
            solver,
        });
        let indexed = self.hierarchy.insert(id, engine);
        debug_assert!(indexed, "{id} indexed twice");
        tracing::info!(world = %id, %name, "constructed world");
        Ok(id)
    }

    pub fn construct_model(
        &mut self,
        world: Identity,
        name: impl Into<String>,
    ) -> Result<Identity, RegistryError> {
        self.require(world, EntityKind::World)?;
        let name = name.into();
        let id = self.models.insert(ModelRecord {
            name: name.clone(),
            world,
        });
        let indexed = self.hierarchy.insert(id, world);
        debug_assert!(indexed, "{id} indexed twice");
        tracing::debug!(model = %id, %world, %name, "constructed model");
        Ok(id)
    }

    /// Create a link and register its rigid body with the model's world.
    pub fn construct_link(
        &mut self,
        model: Identity,
        name: impl Into<String>,
        desc: RigidBodyDesc,
    ) -> Result<Identity, RegistryError> {
        let world = self.world_of_model(model)?;
        let record = self.world_record_mut(world)?;
        let body = record.solver.add_rigid_body(desc);
        let name = name.into();
        tracing::debug!(%model, body = body.id(), %name, "constructed link");
        let id = self.links.insert(LinkRecord { name, model, body });
        let indexed = self.hierarchy.insert(id, model);
        debug_assert!(indexed, "{id} indexed twice");
        Ok(id)
    }

    /// Attach a collision shape to a link's rigid body.
    pub fn attach_collision(
        &mut self,
        link: Identity,
        name: impl Into<String>,
        shape: CollisionShape,
    ) -> Result<Identity, RegistryError> {
        self.require(link, EntityKind::Link)?;
        let model = self.model_of_link(link)?;
        let world = self.world_of_model(model)?;
        let link_record = self
            .links
            .get(link)
            .ok_or_else(|| RegistryError::not_found(link))?;
        let world_record = self
            .worlds
            .get_mut(world)
            .ok_or_else(|| RegistryError::not_found(world))?;
        let collider = world_record
            .solver
            .attach_shape(&link_record.body, &shape)?;
        let collider_id = collider.id();

        let id = self.collisions.insert(CollisionRecord {
            name: name.into(),
            link,
            model,
            shape,
            collider,
        });
        let indexed = self.hierarchy.insert(id, link);
        debug_assert!(indexed, "{id} indexed twice");
        tracing::debug!(shape = %id, %link, collider = collider_id, "attached collision");
        Ok(id)
    }

    /// Connect two links with a constraint.
    ///
    /// The links may belong to different models of the same world. The joint
    /// is listed under the child link's model and goes away when either
    /// endpoint's model is removed.
    pub fn construct_joint(
        &mut self,
        parent_link: Identity,
        child_link: Identity,
        name: impl Into<String>,
        desc: JointDesc,
    ) -> Result<Identity, RegistryError> {
        let parent_world = self.world_of_model(self.model_of_link(parent_link)?)?;
        let model = self.model_of_link(child_link)?;
        let child_world = self.world_of_model(model)?;
        if parent_world != child_world {
            return Err(RegistryError::CrossWorldJoint {
                parent: parent_link,
                child: child_link,
            });
        }

        let (parent, child) = match (self.links.get(parent_link), self.links.get(child_link)) {
            (Some(p), Some(c)) => (p, c),
            _ => return Err(RegistryError::not_found(child_link)),
        };
        let world_record = self
            .worlds
            .get_mut(child_world)
            .ok_or_else(|| RegistryError::not_found(child_world))?;
        let constraint = world_record
            .solver
            .add_constraint(desc, &parent.body, &child.body)?;

        let name = name.into();
        tracing::debug!(
            %parent_link,
            %child_link,
            constraint = constraint.id(),
            %name,
            "constructed joint"
        );
        let id = self.joints.insert(JointRecord {
            name,
            parent_link,
            child_link,
            model,
            constraint,
        });
        let indexed = self.hierarchy.insert(id, model);
        debug_assert!(indexed, "{id} indexed twice");
        Ok(id)
    }

    /// Whether `id` refers to a live entity.
    pub fn exists(&self, id: Identity) -> bool {
        match id.kind() {
            EntityKind::Engine => id == Identity::ENGINE,
            EntityKind::World => self.worlds.contains(id),
            EntityKind::Model => self.models.contains(id),
            EntityKind::Link => self.links.contains(id),
            EntityKind::Joint => self.joints.contains(id),
            EntityKind::Shape => self.collisions.contains(id),
        }
    }

    /// Whether `model` is gone (or never was a model).
    pub fn model_removed(&self, model: Identity) -> bool {
        !self.models.contains(model)
    }

    /// Read-only access to a world's solver composite.
    pub fn solver(&self, world: Identity) -> Result<&SolverWorld, RegistryError> {
        self.require(world, EntityKind::World)?;
        self.worlds
            .get(world)
            .map(|w| &w.solver)
            .ok_or_else(|| RegistryError::not_found(world))
    }

    /// Solver id of a link's rigid body.
    pub fn link_body_id(&self, link: Identity) -> Result<u64, RegistryError> {
        self.require(link, EntityKind::Link)?;
        self.links
            .get(link)
            .map(|l| l.body.id())
            .ok_or_else(|| RegistryError::not_found(link))
    }

    /// Solver id of a joint's constraint.
    pub fn joint_constraint_id(&self, joint: Identity) -> Result<u64, RegistryError> {
        self.require(joint, EntityKind::Joint)?;
        self.joints
            .get(joint)
            .map(|j| j.constraint.id())
            .ok_or_else(|| RegistryError::not_found(joint))
    }

    /// Geometry a collision was attached with.
    pub fn collision_shape(&self, shape: Identity) -> Result<&CollisionShape, RegistryError> {
        self.require(shape, EntityKind::Shape)?;
        self.collisions
            .get(shape)
            .map(|c| &c.shape)
            .ok_or_else(|| RegistryError::not_found(shape))
    }

    /// Solver id of a collision's collider.
    pub fn shape_collider_id(&self, shape: Identity) -> Result<u64, RegistryError> {
        self.require(shape, EntityKind::Shape)?;
        self.collisions
            .get(shape)
            .map(|c| c.collider.id())
            .ok_or_else(|| RegistryError::not_found(shape))
    }

    /// Advance a world's solver by one fixed timestep.
    pub fn step_world(&mut self, world: Identity) -> Result<(), RegistryError> {
        self.require(world, EntityKind::World)?;
        self.world_record_mut(world)?.solver.step();
        Ok(())
    }

    /// Check every registry and solver invariant.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (child, parent) in self.hierarchy.entries() {
            if !self.exists(child) {
                return Err(RegistryError::Inconsistent(format!(
                    "hierarchy entry for missing {child}"
                )));
            }
            if !self.exists(parent) {
                return Err(RegistryError::Inconsistent(format!(
                    "{child} has dangling parent {parent}"
                )));
            }
        }

        for (id, _) in self.worlds.iter() {
            self.expect_parent(id, Identity::ENGINE)?;
        }
        for (id, model) in self.models.iter() {
            self.expect_parent(id, model.world)?;
        }

        for (world_id, world) in self.worlds.iter() {
            let dynamics = world.solver.dynamics();
            let mut bodies = 0;
            for (id, link) in self.links.iter() {
                if self.models.get(link.model).map(|m| m.world) != Some(world_id) {
                    continue;
                }
                self.expect_parent(id, link.model)?;
                if !dynamics.contains_body(link.body.id()) {
                    return Err(RegistryError::Inconsistent(format!(
                        "{id} body {} is not in {world_id}",
                        link.body.id()
                    )));
                }
                bodies += 1;
            }
            let mut constraints = 0;
            for (id, joint) in self.joints.iter() {
                if self.models.get(joint.model).map(|m| m.world) != Some(world_id) {
                    continue;
                }
                self.expect_parent(id, joint.model)?;
                if !dynamics.contains_constraint(joint.constraint.id()) {
                    return Err(RegistryError::Inconsistent(format!(
                        "{id} constraint {} is not in {world_id}",
                        joint.constraint.id()
                    )));
                }
                constraints += 1;
            }
            let mut shapes = 0;
            for (id, collision) in self.collisions.iter() {
                if self.models.get(collision.model).map(|m| m.world) != Some(world_id) {
                    continue;
                }
                self.expect_parent(id, collision.link)?;
                if !dynamics.contains_shape(collision.collider.id()) {
                    return Err(RegistryError::Inconsistent(format!(
                        "{id} collider {} is not in {world_id}",
                        collision.collider.id()
                    )));
                }
                shapes += 1;
            }
            let registered = (
                dynamics.body_count(),
                dynamics.constraint_count(),
                dynamics.shape_count(),
            );
            if registered != (bodies, constraints, shapes) {
                return Err(RegistryError::Inconsistent(format!(
                    "{world_id} solver holds {registered:?} bodies/constraints/shapes, \
                     registry has {:?}",
                    (bodies, constraints, shapes)
                )));
            }
        }
        Ok(())
    }

    fn expect_parent(&self, id: Identity, parent: Identity) -> Result<(), RegistryError> {
        match self.hierarchy.parent_of(id) {
            Some(p) if p == parent => Ok(()),
            Some(p) => Err(RegistryError::Inconsistent(format!(
                "{id} is indexed under {p} but its record names {parent}"
            ))),
            None => Err(RegistryError::Inconsistent(format!(
                "{id} has no hierarchy entry"
            ))),
        }
    }

    /// Fail unless `id` is a live entity of `kind`.
    pub(crate) fn require(&self, id: Identity, kind: EntityKind) -> Result<(), RegistryError> {
        if id.kind() != kind {
            return Err(RegistryError::WrongKind {
                expected: kind,
                actual: id,
            });
        }
        if !self.exists(id) {
            return Err(RegistryError::not_found(id));
        }
        Ok(())
    }

    fn world_record_mut(&mut self, world: Identity) -> Result<&mut WorldRecord, RegistryError> {
        self.worlds
            .get_mut(world)
            .ok_or_else(|| RegistryError::not_found(world))
    }
}
