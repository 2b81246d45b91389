//! Cascading model removal.
//!
//! Removal plans everything it will touch first and checks the plan against
//! the solver. Only a fully consistent plan is executed, so a model is either
//! removed with all its dependents or left untouched.

use serde::{Deserialize, Serialize};
use tether_common::{EntityKind, Identity, RegistryError, SolverError};
use tether_solver::Refused;

use crate::hierarchy::Hierarchy;
use crate::manager::EntityManager;

/// What a successful model removal took out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    pub model: Identity,
    pub world: Identity,
    pub joints: usize,
    pub collisions: usize,
    pub links: usize,
}

struct RemovalPlan {
    model: Identity,
    world: Identity,
    joints: Vec<Identity>,
    collisions: Vec<Identity>,
    links: Vec<Identity>,
}

impl EntityManager {
    /// Remove a model and everything that depends on it. False if it does not exist.
    pub fn remove_model(&mut self, model: Identity) -> bool {
        log_outcome(self.try_remove_model(model))
    }

    /// Remove the `index`th model of `world`.
    pub fn remove_model_by_index(&mut self, world: Identity, index: usize) -> bool {
        let result = self
            .model(world, index)
            .and_then(|model| self.try_remove_model(model));
        log_outcome(result)
    }

    /// Remove the first model of `world` named `name`.
    pub fn remove_model_by_name(&mut self, world: Identity, name: &str) -> bool {
        match self
            .model_by_name(world, name)
            .and_then(|model| self.model_index(model))
        {
            Ok(index) => self.remove_model_by_index(world, index),
            Err(err) => log_outcome(Err(err)),
        }
    }

    /// Remove a model, reporting why when nothing was removed.
    ///
    /// Joints go first (either endpoint in this model), then collisions, then
    /// links, then the model itself. Constraints are always detached before
    /// the bodies they reference.
    pub fn try_remove_model(&mut self, model: Identity) -> Result<RemovalReport, RegistryError> {
        self.require(model, EntityKind::Model)?;
        let plan = self.plan_removal(model)?;
        Ok(self.execute_removal(plan))
    }

    fn plan_removal(&self, model: Identity) -> Result<RemovalPlan, RegistryError> {
        let world = self.world_of_model(model)?;
        let solver = self.solver(world).map_err(|_| {
            RegistryError::Inconsistent(format!("{model} belongs to missing {world}"))
        })?;
        let dynamics = solver.dynamics();

        let links: Vec<Identity> = self
            .links
            .iter()
            .filter(|(_, l)| l.model == model)
            .map(|(id, _)| id)
            .collect();

        let mut joints = Vec::new();
        for (id, joint) in self.joints.iter() {
            let endpoints = [joint.parent_link, joint.child_link];
            let mut ours = false;
            for link in endpoints {
                let owner = self.links.get(link).map(|l| l.model).ok_or_else(|| {
                    RegistryError::Inconsistent(format!("{id} references missing {link}"))
                })?;
                ours |= owner == model;
            }
            if ours {
                if !dynamics.contains_constraint(joint.constraint.id()) {
                    return Err(RegistryError::Inconsistent(format!(
                        "{id} constraint {} is not registered",
                        joint.constraint.id()
                    )));
                }
                joints.push(id);
            }
        }

        let mut collisions = Vec::new();
        for (id, collision) in self.collisions.iter() {
            if collision.model != model {
                continue;
            }
            if !dynamics.contains_shape(collision.collider.id()) {
                return Err(RegistryError::Inconsistent(format!(
                    "{id} collider {} is not registered",
                    collision.collider.id()
                )));
            }
            collisions.push(id);
        }

        for link in &links {
            let Some(record) = self.links.get(*link) else {
                continue;
            };
            let body = record.body.id();
            if !dynamics.contains_body(body) {
                return Err(RegistryError::Inconsistent(format!(
                    "{link} body {body} is not registered"
                )));
            }
            let planned = joints
                .iter()
                .filter_map(|j| self.joints.get(*j))
                .filter(|j| j.touches(*link))
                .count();
            let registered = dynamics.constraints_on(body);
            if planned != registered {
                return Err(RegistryError::Inconsistent(format!(
                    "{link} body {body} has {registered} constraints, registry knows {planned}"
                )));
            }
            let planned = collisions
                .iter()
                .filter_map(|c| self.collisions.get(*c))
                .filter(|c| c.link == *link)
                .count();
            let registered = dynamics.shapes_on(body);
            if planned != registered {
                return Err(RegistryError::Inconsistent(format!(
                    "{link} body {body} carries {registered} shapes, registry knows {planned}"
                )));
            }
        }

        Ok(RemovalPlan {
            model,
            world,
            joints,
            collisions,
            links,
        })
    }

    fn execute_removal(&mut self, plan: RemovalPlan) -> RemovalReport {
        let Some(world) = self.worlds.get_mut(plan.world) else {
            unreachable!("removal plan validated {}", plan.world);
        };
        let solver = &mut world.solver;

        for id in &plan.joints {
            let detached = self.joints.remove_with(*id, |mut joint| {
                match solver.remove_constraint(joint.constraint) {
                    Ok(_) => Ok(()),
                    Err(Refused { handle, error }) => {
                        joint.constraint = handle;
                        Err((joint, error))
                    }
                }
            });
            settle(&mut self.hierarchy, *id, detached);
        }
        tracing::debug!(model = %plan.model, count = plan.joints.len(), "detached joints");

        for id in &plan.collisions {
            let detached = self.collisions.remove_with(*id, |mut collision| {
                match solver.detach_shape(collision.collider) {
                    Ok(_) => Ok(()),
                    Err(Refused { handle, error }) => {
                        collision.collider = handle;
                        Err((collision, error))
                    }
                }
            });
            settle(&mut self.hierarchy, *id, detached);
        }
        tracing::debug!(
            model = %plan.model,
            count = plan.collisions.len(),
            "detached collisions"
        );

        for id in &plan.links {
            let detached = self.links.remove_with(*id, |mut link| {
                match solver.remove_rigid_body(link.body) {
                    Ok(_) => Ok(()),
                    Err(Refused { handle, error }) => {
                        link.body = handle;
                        Err((link, error))
                    }
                }
            });
            settle(&mut self.hierarchy, *id, detached);
        }
        tracing::debug!(model = %plan.model, count = plan.links.len(), "removed links");

        self.models.remove(plan.model);
        if self.hierarchy.remove(plan.model).is_none() {
            broken_invariant(plan.model, "missing hierarchy entry");
        }

        RemovalReport {
            model: plan.model,
            world: plan.world,
            joints: plan.joints.len(),
            collisions: plan.collisions.len(),
            links: plan.links.len(),
        }
    }
}

fn log_outcome(result: Result<RemovalReport, RegistryError>) -> bool {
    match result {
        Ok(report) => {
            tracing::info!(
                model = %report.model,
                joints = report.joints,
                collisions = report.collisions,
                links = report.links,
                "removed model"
            );
            true
        }
        Err(err) if err.is_not_found() => {
            tracing::debug!(%err, "model removal found nothing to remove");
            false
        }
        Err(err) => {
            tracing::warn!(%err, "model removal refused");
            false
        }
    }
}

/// Drop the hierarchy entry of a record the solver let go of.
///
/// A refused release leaves record and entry in place.
fn settle(hierarchy: &mut Hierarchy, id: Identity, detached: Option<Result<(), SolverError>>) {
    match detached {
        Some(Ok(())) => {
            if hierarchy.remove(id).is_none() {
                broken_invariant(id, "missing hierarchy entry");
            }
        }
        Some(Err(err)) => broken_invariant(id, &err.to_string()),
        None => broken_invariant(id, "record vanished before removal"),
    }
}

/// A validated plan hit state it did not expect; the registry was already corrupt.
fn broken_invariant(id: Identity, what: &str) {
    tracing::error!(%id, what, "registry invariant broken during removal");
    debug_assert!(false, "registry invariant broken for {id}: {what}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_solver::{CollisionShape, JointDesc, JointType, RigidBodyDesc};

    fn counts(em: &EntityManager) -> [usize; 5] {
        [
            em.worlds.len(),
            em.models.len(),
            em.links.len(),
            em.joints.len(),
            em.collisions.len(),
        ]
    }

    /// W1 with M1 (L1, L2, joint L1-L2, shape on L1).
    fn scenario() -> (EntityManager, Identity, Identity, [Identity; 4]) {
        let mut em = EntityManager::new();
        let world = em.construct_empty_world(em.engine(), "W1").unwrap();
        let model = em.construct_model(world, "M1").unwrap();
        let l1 = em.construct_link(model, "L1", RigidBodyDesc::default()).unwrap();
        let l2 = em.construct_link(model, "L2", RigidBodyDesc::default()).unwrap();
        let joint = em
            .construct_joint(l1, l2, "J1", JointDesc::new(JointType::Fixed))
            .unwrap();
        let shape = em
            .attach_collision(l1, "C1", CollisionShape::Sphere { radius: 0.5 })
            .unwrap();
        (em, world, model, [l1, l2, joint, shape])
    }

    #[test]
    fn remove_model_cascades() {
        let (mut em, world, model, [l1, l2, joint, shape]) = scenario();
        let bodies = [em.link_body_id(l1).unwrap(), em.link_body_id(l2).unwrap()];
        let constraint = em.joint_constraint_id(joint).unwrap();

        assert!(em.remove_model(model));

        assert!(!em.exists(model));
        assert!(em.model_removed(model));
        for id in [l1, l2, joint, shape] {
            assert!(!em.exists(id), "{id} survived");
        }
        assert_eq!(em.model_count(world).unwrap(), 0);
        let dynamics = em.solver(world).unwrap().dynamics();
        for body in bodies {
            assert!(!dynamics.contains_body(body));
        }
        assert!(!dynamics.contains_constraint(constraint));
        assert_eq!(dynamics.body_count(), 0);
        assert_eq!(dynamics.constraint_count(), 0);
        assert_eq!(dynamics.shape_count(), 0);
        assert_eq!(em.hierarchy.len(), 1);
        em.validate().unwrap();
    }

    #[test]
    fn report_counts_each_pass() {
        let (mut em, world, model, _) = scenario();
        let report = em.try_remove_model(model).unwrap();
        assert_eq!(
            report,
            RemovalReport {
                model,
                world,
                joints: 1,
                collisions: 1,
                links: 2
            }
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"links\":2"));
    }

    #[test]
    fn removing_missing_model_changes_nothing() {
        let (mut em, _, _, _) = scenario();
        let before = counts(&em);
        let ghost = Identity::new(EntityKind::Model, 99, 0);
        assert!(!em.remove_model(ghost));
        assert_eq!(
            em.try_remove_model(ghost).unwrap_err(),
            RegistryError::not_found(ghost)
        );
        assert_eq!(counts(&em), before);
        em.validate().unwrap();
    }

    #[test]
    fn second_removal_fails() {
        let (mut em, world, model, _) = scenario();
        assert!(em.remove_model(model));
        let after_first = counts(&em);
        assert!(!em.remove_model(model));
        assert_eq!(counts(&em), after_first);
        assert_eq!(em.solver(world).unwrap().dynamics().body_count(), 0);
    }

    #[test]
    fn stale_identity_after_slot_reuse() {
        let (mut em, world, model, _) = scenario();
        assert!(em.remove_model(model));
        let replacement = em.construct_model(world, "M2").unwrap();
        assert_eq!(replacement.slot(), model.slot());
        assert!(!em.remove_model(model));
        assert!(em.exists(replacement));
    }

    #[test]
    fn non_model_identity_is_refused() {
        let (mut em, world, _, [l1, ..]) = scenario();
        let before = counts(&em);
        assert!(!em.remove_model(l1));
        assert!(matches!(
            em.try_remove_model(world),
            Err(RegistryError::WrongKind { .. })
        ));
        assert_eq!(counts(&em), before);
    }

    #[test]
    fn remove_by_name_unknown_is_false() {
        let (mut em, world, model, _) = scenario();
        let before = counts(&em);
        assert!(!em.remove_model_by_name(world, "nonexistent"));
        assert_eq!(counts(&em), before);
        assert!(em.exists(model));
    }

    #[test]
    fn remove_by_name_takes_first_match_only() {
        let mut em = EntityManager::new();
        let world = em.construct_empty_world(em.engine(), "W1").unwrap();
        let first = em.construct_model(world, "twin").unwrap();
        let second = em.construct_model(world, "twin").unwrap();
        em.construct_link(first, "a", RigidBodyDesc::default()).unwrap();
        em.construct_link(second, "b", RigidBodyDesc::default()).unwrap();

        assert!(em.remove_model_by_name(world, "twin"));
        assert!(!em.exists(first));
        assert!(em.exists(second));
        assert_eq!(em.link_count(second).unwrap(), 1);
        assert_eq!(em.solver(world).unwrap().dynamics().body_count(), 1);
        em.validate().unwrap();
    }

    #[test]
    fn remove_by_index() {
        let mut em = EntityManager::new();
        let world = em.construct_empty_world(em.engine(), "W1").unwrap();
        let m0 = em.construct_model(world, "m0").unwrap();
        let m1 = em.construct_model(world, "m1").unwrap();
        let m2 = em.construct_model(world, "m2").unwrap();

        let before = counts(&em);
        assert!(!em.remove_model_by_index(world, 3));
        assert_eq!(counts(&em), before);
        assert!(em.remove_model_by_index(world, 1));
        assert!(!em.exists(m1));
        assert_eq!(em.model(world, 0).unwrap(), m0);
        assert_eq!(em.model(world, 1).unwrap(), m2);
        assert_eq!(em.model_index(m2).unwrap(), 1);
    }

    #[test]
    fn remove_by_index_in_wrong_world_is_false() {
        let mut em = EntityManager::new();
        let w1 = em.construct_empty_world(em.engine(), "W1").unwrap();
        let w2 = em.construct_empty_world(em.engine(), "W2").unwrap();
        let m = em.construct_model(w1, "m").unwrap();
        assert!(!em.remove_model_by_index(w2, 0));
        assert!(!em.remove_model_by_name(w2, "m"));
        assert!(em.exists(m));
    }

    #[test]
    fn cross_model_joint_goes_with_either_model() {
        let mut em = EntityManager::new();
        let world = em.construct_empty_world(em.engine(), "W1").unwrap();
        let ma = em.construct_model(world, "A").unwrap();
        let mb = em.construct_model(world, "B").unwrap();
        let la = em.construct_link(ma, "la", RigidBodyDesc::default()).unwrap();
        let lb = em.construct_link(mb, "lb", RigidBodyDesc::default()).unwrap();
        // Listed under B, the child's model.
        let joint = em
            .construct_joint(la, lb, "bridge", JointDesc::new(JointType::Ball))
            .unwrap();
        assert_eq!(em.model_of_joint(joint).unwrap(), mb);
        assert_eq!(em.joint_count(ma).unwrap(), 0);

        // Removing the parent link's model still detaches the joint first.
        let report = em.try_remove_model(ma).unwrap();
        assert_eq!(report.joints, 1);
        assert!(!em.exists(joint));
        assert!(em.exists(lb));
        assert_eq!(em.joint_count(mb).unwrap(), 0);
        let dynamics = em.solver(world).unwrap().dynamics();
        assert_eq!(dynamics.constraint_count(), 0);
        assert!(dynamics.contains_body(em.link_body_id(lb).unwrap()));
        em.validate().unwrap();
    }

    #[test]
    fn cross_model_joint_removed_from_child_side() {
        let mut em = EntityManager::new();
        let world = em.construct_empty_world(em.engine(), "W1").unwrap();
        let ma = em.construct_model(world, "A").unwrap();
        let mb = em.construct_model(world, "B").unwrap();
        let la = em.construct_link(ma, "la", RigidBodyDesc::default()).unwrap();
        let lb = em.construct_link(mb, "lb", RigidBodyDesc::default()).unwrap();
        let joint = em
            .construct_joint(la, lb, "bridge", JointDesc::new(JointType::Fixed))
            .unwrap();

        assert!(em.remove_model(mb));
        assert!(!em.exists(joint));
        assert!(em.exists(la));
        assert_eq!(em.solver(world).unwrap().dynamics().body_count(), 1);
        em.validate().unwrap();
    }

    #[test]
    fn other_worlds_are_untouched() {
        let (mut em, _, model, _) = scenario();
        let w2 = em.construct_empty_world(em.engine(), "W2").unwrap();
        let m2 = em.construct_model(w2, "M1").unwrap();
        let l = em.construct_link(m2, "L1", RigidBodyDesc::default()).unwrap();

        assert!(em.remove_model(model));
        assert!(em.exists(m2));
        assert!(em.exists(l));
        assert_eq!(em.solver(w2).unwrap().dynamics().body_count(), 1);
        em.validate().unwrap();
    }

    #[test]
    fn unregistered_constraint_refuses_removal() {
        let (mut em, world, model, [l1, l2, ..]) = scenario();
        // A constraint the registry does not know about pins L1.
        let world_record = em.worlds.get_mut(world).unwrap();
        let (a, b) = (em.links.get(l1).unwrap(), em.links.get(l2).unwrap());
        let _stray = world_record
            .solver
            .add_constraint(JointDesc::new(JointType::Ball), &a.body, &b.body)
            .unwrap();
        let before = counts(&em);

        let err = em.try_remove_model(model).unwrap_err();
        assert!(matches!(err, RegistryError::Inconsistent(_)));
        assert!(!em.remove_model(model));
        assert_eq!(counts(&em), before);
        assert!(em.exists(model));
    }

    #[test]
    fn unregistered_shape_refuses_removal() {
        let (mut em, world, model, [_, l2, ..]) = scenario();
        let world_record = em.worlds.get_mut(world).unwrap();
        let link = em.links.get(l2).unwrap();
        let _stray = world_record
            .solver
            .attach_shape(&link.body, &CollisionShape::Sphere { radius: 0.1 })
            .unwrap();
        let before = counts(&em);

        let err = em.try_remove_model(model).unwrap_err();
        assert!(matches!(err, RegistryError::Inconsistent(msg) if msg.contains("shapes")));
        assert_eq!(counts(&em), before);
        assert_eq!(em.solver(world).unwrap().dynamics().shape_count(), 2);
    }

    #[test]
    fn world_keeps_stepping_after_removal() {
        let (mut em, world, model, _) = scenario();
        let survivor = em.construct_model(world, "M2").unwrap();
        let link = em
            .construct_link(survivor, "L", RigidBodyDesc::default())
            .unwrap();
        em.attach_collision(link, "ball", CollisionShape::Sphere { radius: 0.5 })
            .unwrap();
        em.step_world(world).unwrap();

        assert!(em.remove_model(model));
        em.step_world(world).unwrap();
        let dynamics = em.solver(world).unwrap().dynamics();
        assert_eq!(dynamics.body_count(), 1);
        assert_eq!(dynamics.shape_count(), 1);
        em.validate().unwrap();
    }
}
