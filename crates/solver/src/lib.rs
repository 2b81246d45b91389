//! Solver collaborator: the object-lifetime surface of the rigid-body solver.
//!
//! Wraps a rapier3d world in the shape the entity layer needs: one composite
//! per simulation world (integration parameters, narrow-phase dispatcher,
//! broadphase, constraint solver pipeline, dynamics sets), add/remove
//! primitives for rigid bodies, collision shapes and constraints, and a
//! registration hook that gates which shape classes may be attached.
//!
//! # Invariants
//! - A body referenced by a constraint cannot be removed until the constraint is.
//! - Handles are move-only and released by value. A refused release hands the
//!   handle back in [`Refused`], so it is never lost while its object lives.
//! - Teardown detaches constraints before the bodies they reference.

mod collision;
mod config;
mod dynamics;
mod world;

pub use collision::{CollisionAlgorithm, CollisionDispatcher, CollisionShape, ShapeClass};
pub use config::{SolverConfig, SolverInfo};
pub use dynamics::{
    BodyHandle, ConstraintHandle, DynamicsWorld, JointDesc, JointType, Refused, Released,
    RigidBodyDesc, ShapeHandle,
};
pub use world::SolverWorld;
