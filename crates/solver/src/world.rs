use rapier3d::prelude::{
    CCDSolver, Collider, DefaultBroadPhase, ImpulseJoint, IntegrationParameters, PhysicsPipeline,
    RigidBody,
};
use tether_common::SolverError;

use crate::collision::{CollisionDispatcher, CollisionShape};
use crate::config::{SolverConfig, SolverInfo};
use crate::dynamics::{
    BodyHandle, ConstraintHandle, DynamicsWorld, JointDesc, Refused, RigidBodyDesc, ShapeHandle,
};

/// Constraint solver: the step pipeline and its continuous-collision pass.
struct ConstraintSolver {
    pipeline: PhysicsPipeline,
    ccd: CCDSolver,
}

/// The full solver composite for one simulation world.
///
/// Owns every solver sub-object. Dropping it first releases constraints,
/// shapes and bodies from the dynamics world in that order; the fields then
/// drop in declaration order: dynamics world, constraint solver, broadphase,
/// dispatcher, configuration.
pub struct SolverWorld {
    dynamics: DynamicsWorld,
    solver: ConstraintSolver,
    broadphase: DefaultBroadPhase,
    dispatcher: CollisionDispatcher,
    configuration: IntegrationParameters,
}

impl std::fmt::Debug for SolverWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverWorld")
            .field("dynamics", &self.dynamics)
            .field("dispatcher", &self.dispatcher)
            .field("dt", &self.configuration.dt)
            .finish()
    }
}

impl SolverWorld {
    /// Assemble configuration, dispatcher, broadphase, solver and dynamics world.
    pub fn new(config: &SolverConfig) -> Self {
        let configuration = config.integration_parameters();
        let dispatcher = CollisionDispatcher::new();
        let broadphase = DefaultBroadPhase::new();
        let solver = ConstraintSolver {
            pipeline: PhysicsPipeline::new(),
            ccd: CCDSolver::new(),
        };
        let dynamics = DynamicsWorld::new(config.gravity, SolverInfo::from_config(config));
        Self {
            dynamics,
            solver,
            broadphase,
            dispatcher,
            configuration,
        }
    }

    pub fn dynamics(&self) -> &DynamicsWorld {
        &self.dynamics
    }

    pub fn dynamics_mut(&mut self) -> &mut DynamicsWorld {
        &mut self.dynamics
    }

    pub fn dispatcher(&self) -> &CollisionDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut CollisionDispatcher {
        &mut self.dispatcher
    }

    pub fn configuration(&self) -> &IntegrationParameters {
        &self.configuration
    }

    /// Advance the simulation by one fixed timestep.
    pub fn step(&mut self) {
        let gravity = self.dynamics.gravity();
        let dynamics = &mut self.dynamics;
        self.solver.pipeline.step(
            gravity,
            &self.configuration,
            &mut dynamics.islands,
            &mut self.broadphase,
            &mut self.dispatcher.narrow_phase,
            &mut dynamics.bodies,
            &mut dynamics.colliders,
            &mut dynamics.impulse_joints,
            &mut dynamics.multibody_joints,
            &mut self.solver.ccd,
            &(),
            &(),
        );
    }

    /// Create a body in the dynamics world.
    pub fn add_rigid_body(&mut self, desc: RigidBodyDesc) -> BodyHandle {
        self.dynamics.insert_body(&desc)
    }

    /// Detach a body from the world. Refused while a constraint references it.
    pub fn remove_rigid_body(
        &mut self,
        handle: BodyHandle,
    ) -> Result<RigidBody, Refused<BodyHandle>> {
        self.dynamics.remove_rigid_body(handle)
    }

    /// Attach a collision shape to a body.
    ///
    /// The shape's classes must have a registered algorithm on the dispatcher.
    pub fn attach_shape(
        &mut self,
        body: &BodyHandle,
        shape: &CollisionShape,
    ) -> Result<ShapeHandle, SolverError> {
        self.dispatcher.check_shape(shape)?;
        let geometry = shape.to_shared_shape()?;
        self.dynamics.insert_shape(body, geometry)
    }

    pub fn detach_shape(&mut self, handle: ShapeHandle) -> Result<Collider, Refused<ShapeHandle>> {
        self.dynamics.remove_shape(handle)
    }

    pub fn add_constraint(
        &mut self,
        desc: JointDesc,
        parent: &BodyHandle,
        child: &BodyHandle,
    ) -> Result<ConstraintHandle, SolverError> {
        self.dynamics.add_constraint(&desc, parent, child)
    }

    pub fn remove_constraint(
        &mut self,
        handle: ConstraintHandle,
    ) -> Result<ImpulseJoint, Refused<ConstraintHandle>> {
        self.dynamics.remove_constraint(handle)
    }
}

impl Drop for SolverWorld {
    fn drop(&mut self) {
        match self.dynamics.release_all() {
            Ok(released) => tracing::trace!(?released, "released solver world"),
            Err(err) => tracing::error!(%err, "solver world teardown left objects registered"),
        }
    }
}
