//! In-memory entity records.
//!
//! Records own the solver handles for their entity. A record is erased only
//! after the solver has accepted its handle back.

use tether_common::Identity;
use tether_solver::{BodyHandle, CollisionShape, ConstraintHandle, ShapeHandle, SolverWorld};

#[derive(Debug)]
pub struct WorldRecord {
    pub name: String,
    pub solver: SolverWorld,
}

#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub name: String,
    pub world: Identity,
}

#[derive(Debug)]
pub struct LinkRecord {
    pub name: String,
    pub model: Identity,
    pub body: BodyHandle,
}

/// A shape carried by its link's rigid body.
#[derive(Debug)]
pub struct CollisionRecord {
    pub name: String,
    pub link: Identity,
    pub model: Identity,
    pub shape: CollisionShape,
    pub collider: ShapeHandle,
}

#[derive(Debug)]
pub struct JointRecord {
    pub name: String,
    pub parent_link: Identity,
    pub child_link: Identity,
    /// Model of the child link. The joint is listed under it.
    pub model: Identity,
    pub constraint: ConstraintHandle,
}

impl JointRecord {
    pub fn touches(&self, link: Identity) -> bool {
        self.parent_link == link || self.child_link == link
    }
}
