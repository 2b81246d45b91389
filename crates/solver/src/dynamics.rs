use glam::Vec3;
use rapier3d::prelude::{
    Collider, ColliderBuilder, ColliderHandle, ColliderSet, FixedJointBuilder, GenericJoint,
    ImpulseJoint, ImpulseJointHandle, ImpulseJointSet, IslandManager, MultibodyJointSet,
    PrismaticJointBuilder, RevoluteJointBuilder, RigidBody, RigidBodyBuilder, RigidBodyHandle,
    RigidBodySet, SharedShape, SphericalJointBuilder,
};
use serde::{Deserialize, Serialize};
use tether_common::{Pose, SolverError};

use crate::config::SolverInfo;

fn pack((index, generation): (u32, u32)) -> u64 {
    (u64::from(generation) << 32) | u64::from(index)
}

fn unpack(id: u64) -> (u32, u32) {
    (id as u32, (id >> 32) as u32)
}

/// Owned handle to a rigid body registered with a [`DynamicsWorld`].
///
/// Not `Clone`: the body is released by moving the handle into
/// [`SolverWorld::remove_rigid_body`](crate::SolverWorld::remove_rigid_body),
/// so a second release does not compile:
///
/// ```compile_fail
/// use tether_solver::{RigidBodyDesc, SolverConfig, SolverWorld};
///
/// let mut world = SolverWorld::new(&SolverConfig::default());
/// let body = world.add_rigid_body(RigidBodyDesc::default());
/// world.remove_rigid_body(body).unwrap();
/// world.remove_rigid_body(body).unwrap();
/// ```
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct BodyHandle(RigidBodyHandle);

impl BodyHandle {
    /// Stable numeric id: slot index in the low bits, generation in the high bits.
    pub fn id(&self) -> u64 {
        pack(self.0.into_raw_parts())
    }
}

/// Owned handle to a constraint registered with a [`DynamicsWorld`].
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct ConstraintHandle(ImpulseJointHandle);

impl ConstraintHandle {
    pub fn id(&self) -> u64 {
        pack(self.0.into_raw_parts())
    }
}

/// Owned handle to a collision shape attached to a body.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct ShapeHandle(ColliderHandle);

impl ShapeHandle {
    pub fn id(&self) -> u64 {
        pack(self.0.into_raw_parts())
    }
}

/// A release the dynamics world turned down.
///
/// Carries the handle back so the caller still owns the live object.
#[derive(Debug)]
pub struct Refused<H> {
    pub handle: H,
    pub error: SolverError,
}

impl<H> Refused<H> {
    fn new(handle: H, error: SolverError) -> Self {
        Self { handle, error }
    }
}

/// Objects released by [`DynamicsWorld::release_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Released {
    pub constraints: usize,
    pub shapes: usize,
    pub bodies: usize,
}

/// Parameters for creating a rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBodyDesc {
    pub mass: f32,
    pub pose: Pose,
    pub kinematic: bool,
}

impl Default for RigidBodyDesc {
    fn default() -> Self {
        Self {
            mass: 1.0,
            pose: Pose::default(),
            kinematic: false,
        }
    }
}

impl RigidBodyDesc {
    fn build(&self) -> RigidBody {
        let builder = if self.kinematic {
            RigidBodyBuilder::kinematic_position_based()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let (axis, angle) = self.pose.rotation.to_axis_angle();
        builder
            .translation(self.pose.position)
            .rotation(axis * angle)
            .additional_mass(self.mass)
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointType {
    Fixed,
    Revolute { axis: Vec3 },
    Prismatic { axis: Vec3 },
    Ball,
}

/// Parameters for creating a two-body constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointDesc {
    pub joint_type: JointType,
    /// Anchor in the parent body frame.
    pub parent_anchor: Vec3,
    /// Anchor in the child body frame.
    pub child_anchor: Vec3,
}

impl JointDesc {
    pub fn new(joint_type: JointType) -> Self {
        Self {
            joint_type,
            parent_anchor: Vec3::ZERO,
            child_anchor: Vec3::ZERO,
        }
    }

    fn build(&self) -> GenericJoint {
        let (a, b) = (self.parent_anchor, self.child_anchor);
        match self.joint_type {
            JointType::Fixed => FixedJointBuilder::new()
                .local_anchor1(a)
                .local_anchor2(b)
                .build()
                .into(),
            JointType::Revolute { axis } => RevoluteJointBuilder::new(axis.normalize())
                .local_anchor1(a)
                .local_anchor2(b)
                .build()
                .into(),
            JointType::Prismatic { axis } => PrismaticJointBuilder::new(axis.normalize())
                .local_anchor1(a)
                .local_anchor2(b)
                .build()
                .into(),
            JointType::Ball => SphericalJointBuilder::new()
                .local_anchor1(a)
                .local_anchor2(b)
                .build()
                .into(),
        }
    }
}

/// The live rapier sets of one world: bodies, colliders and joints.
pub struct DynamicsWorld {
    gravity: Vec3,
    solver_info: SolverInfo,
    pub(crate) islands: IslandManager,
    pub(crate) bodies: RigidBodySet,
    pub(crate) colliders: ColliderSet,
    pub(crate) impulse_joints: ImpulseJointSet,
    pub(crate) multibody_joints: MultibodyJointSet,
}

impl std::fmt::Debug for DynamicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicsWorld")
            .field("gravity", &self.gravity)
            .field("solver_info", &self.solver_info)
            .field("bodies", &self.bodies.len())
            .field("colliders", &self.colliders.len())
            .field("constraints", &self.impulse_joints.len())
            .finish()
    }
}

impl DynamicsWorld {
    pub fn new(gravity: Vec3, solver_info: SolverInfo) -> Self {
        Self {
            gravity,
            solver_info,
            islands: IslandManager::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn solver_info(&self) -> &SolverInfo {
        &self.solver_info
    }

    pub fn solver_info_mut(&mut self) -> &mut SolverInfo {
        &mut self.solver_info
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn shape_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.impulse_joints.len()
    }

    pub fn contains_body(&self, id: u64) -> bool {
        let (index, generation) = unpack(id);
        self.bodies
            .get(RigidBodyHandle::from_raw_parts(index, generation))
            .is_some()
    }

    pub fn contains_shape(&self, id: u64) -> bool {
        let (index, generation) = unpack(id);
        self.colliders
            .get(ColliderHandle::from_raw_parts(index, generation))
            .is_some()
    }

    pub fn contains_constraint(&self, id: u64) -> bool {
        let (index, generation) = unpack(id);
        self.impulse_joints
            .get(ImpulseJointHandle::from_raw_parts(index, generation))
            .is_some()
    }

    pub fn body(&self, handle: &BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0)
    }

    /// Number of constraints that reference body `id`.
    pub fn constraints_on(&self, id: u64) -> usize {
        let (index, generation) = unpack(id);
        let body = RigidBodyHandle::from_raw_parts(index, generation);
        self.impulse_joints
            .iter()
            .filter(|(_, joint)| joint.body1 == body || joint.body2 == body)
            .count()
    }

    /// Number of shapes attached to body `id`.
    pub fn shapes_on(&self, id: u64) -> usize {
        let (index, generation) = unpack(id);
        self.bodies
            .get(RigidBodyHandle::from_raw_parts(index, generation))
            .map_or(0, |body| body.colliders().len())
    }

    pub(crate) fn insert_body(&mut self, desc: &RigidBodyDesc) -> BodyHandle {
        BodyHandle(self.bodies.insert(desc.build()))
    }

    pub(crate) fn insert_shape(
        &mut self,
        body: &BodyHandle,
        geometry: SharedShape,
    ) -> Result<ShapeHandle, SolverError> {
        if self.bodies.get(body.0).is_none() {
            return Err(SolverError::BodyNotFound(body.id()));
        }
        let collider = ColliderBuilder::new(geometry).build();
        let handle = self
            .colliders
            .insert_with_parent(collider, body.0, &mut self.bodies);
        Ok(ShapeHandle(handle))
    }

    pub(crate) fn remove_shape(
        &mut self,
        handle: ShapeHandle,
    ) -> Result<Collider, Refused<ShapeHandle>> {
        match self
            .colliders
            .remove(handle.0, &mut self.islands, &mut self.bodies, true)
        {
            Some(collider) => Ok(collider),
            None => {
                let id = handle.id();
                Err(Refused::new(handle, SolverError::ShapeNotFound(id)))
            }
        }
    }

    /// Remove a body and any shapes still attached to it. Refused while a
    /// constraint references it.
    pub(crate) fn remove_rigid_body(
        &mut self,
        handle: BodyHandle,
    ) -> Result<RigidBody, Refused<BodyHandle>> {
        let id = handle.id();
        if self.bodies.get(handle.0).is_none() {
            return Err(Refused::new(handle, SolverError::BodyNotFound(id)));
        }
        let constraints = self.constraints_on(id);
        if constraints > 0 {
            let error = SolverError::BodyConstrained {
                body: id,
                constraints,
            };
            return Err(Refused::new(handle, error));
        }
        match self.bodies.remove(
            handle.0,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        ) {
            Some(body) => Ok(body),
            None => Err(Refused::new(handle, SolverError::BodyNotFound(id))),
        }
    }

    pub(crate) fn add_constraint(
        &mut self,
        desc: &JointDesc,
        parent: &BodyHandle,
        child: &BodyHandle,
    ) -> Result<ConstraintHandle, SolverError> {
        for body in [parent, child] {
            if self.bodies.get(body.0).is_none() {
                return Err(SolverError::BodyNotFound(body.id()));
            }
        }
        if parent.0 == child.0 {
            return Err(SolverError::SelfConstraint(parent.id()));
        }
        let handle = self
            .impulse_joints
            .insert(parent.0, child.0, desc.build(), true);
        Ok(ConstraintHandle(handle))
    }

    pub(crate) fn remove_constraint(
        &mut self,
        handle: ConstraintHandle,
    ) -> Result<ImpulseJoint, Refused<ConstraintHandle>> {
        match self.impulse_joints.remove(handle.0, true) {
            Some(joint) => Ok(joint),
            None => {
                let id = handle.id();
                Err(Refused::new(handle, SolverError::ConstraintNotFound(id)))
            }
        }
    }

    /// Release everything: constraints, then shapes, then bodies.
    ///
    /// Bodies go through the same constraint check as
    /// [`remove_rigid_body`](Self::remove_rigid_body); the first refusal
    /// stops the teardown.
    pub fn release_all(&mut self) -> Result<Released, SolverError> {
        let mut released = Released::default();

        let joints: Vec<ImpulseJointHandle> = self.impulse_joints.iter().map(|(h, _)| h).collect();
        for joint in joints {
            self.remove_constraint(ConstraintHandle(joint))
                .map_err(|refused| refused.error)?;
            released.constraints += 1;
        }

        let shapes: Vec<ColliderHandle> = self.colliders.iter().map(|(h, _)| h).collect();
        for shape in shapes {
            self.remove_shape(ShapeHandle(shape))
                .map_err(|refused| refused.error)?;
            released.shapes += 1;
        }

        let bodies: Vec<RigidBodyHandle> = self.bodies.iter().map(|(h, _)| h).collect();
        for body in bodies {
            self.remove_rigid_body(BodyHandle(body))
                .map_err(|refused| refused.error)?;
            released.bodies += 1;
        }

        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamics() -> DynamicsWorld {
        DynamicsWorld::new(Vec3::new(0.0, 0.0, -9.8), SolverInfo::default())
    }

    #[test]
    fn ids_round_trip_through_raw_parts() {
        assert_eq!(unpack(pack((7, 3))), (7, 3));
        assert_eq!(pack((1, 1)), (1 << 32) | 1);
    }

    #[test]
    fn body_takes_desc_pose() {
        let mut world = dynamics();
        let desc = RigidBodyDesc {
            pose: Pose::from_position(Vec3::new(1.0, 2.0, 3.0)),
            ..RigidBodyDesc::default()
        };
        let body = world.insert_body(&desc);
        let translation = world.body(&body).unwrap().translation();
        assert!((translation - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
        assert!(world.contains_body(body.id()));
    }

    #[test]
    fn refused_release_returns_the_handle() {
        let mut world = dynamics();
        let a = world.insert_body(&RigidBodyDesc::default());
        let b = world.insert_body(&RigidBodyDesc::default());
        let joint = world
            .add_constraint(&JointDesc::new(JointType::Ball), &a, &b)
            .unwrap();

        let refused = world.remove_rigid_body(a).unwrap_err();
        assert_eq!(
            refused.error,
            SolverError::BodyConstrained {
                body: refused.handle.id(),
                constraints: 1
            }
        );
        let a = refused.handle;
        assert!(world.contains_body(a.id()));

        world.remove_constraint(joint).unwrap();
        world.remove_rigid_body(a).unwrap();
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn release_all_detaches_constraints_before_bodies() {
        let mut world = dynamics();
        let bodies: Vec<BodyHandle> = (0..3)
            .map(|_| world.insert_body(&RigidBodyDesc::default()))
            .collect();
        for pair in bodies.windows(2) {
            let desc = JointDesc::new(JointType::Revolute { axis: Vec3::Z });
            let _ = world.add_constraint(&desc, &pair[0], &pair[1]).unwrap();
        }
        let _ = world
            .insert_shape(&bodies[1], SharedShape::ball(0.5))
            .unwrap();
        assert_eq!(world.constraints_on(bodies[1].id()), 2);
        assert_eq!(world.shapes_on(bodies[1].id()), 1);

        let released = world.release_all().unwrap();
        assert_eq!(
            released,
            Released {
                constraints: 2,
                shapes: 1,
                bodies: 3
            }
        );
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.constraint_count(), 0);
        assert_eq!(world.shape_count(), 0);
    }
}
