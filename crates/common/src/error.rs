use crate::types::{EntityKind, Identity};

/// Errors raised by the native solver collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolverError {
    #[error("rigid body {0} is not registered with the dynamics world")]
    BodyNotFound(u64),
    #[error("constraint {0} is not registered with the dynamics world")]
    ConstraintNotFound(u64),
    #[error("collision shape {0} is not registered with the dynamics world")]
    ShapeNotFound(u64),
    #[error("rigid body {body} is still referenced by {constraints} constraint(s)")]
    BodyConstrained { body: u64, constraints: usize },
    #[error("constraint cannot connect rigid body {0} to itself")]
    SelfConstraint(u64),
    #[error("no collision algorithm registered for {0} shapes")]
    UnsupportedShape(&'static str),
    #[error("invalid collision geometry: {0}")]
    InvalidShape(String),
}

/// Errors from registry lookups, construction and removal.
///
/// `NotFound`, `NameNotFound` and `OutOfRange` are expected outcomes that
/// callers handle as ordinary values. `Inconsistent` means a hierarchy or
/// solver invariant was already broken before the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} {identity} does not exist")]
    NotFound { kind: EntityKind, identity: Identity },
    #[error("no {kind} named {name:?}")]
    NameNotFound { kind: EntityKind, name: String },
    #[error("{kind} index {index} out of range (count {count})")]
    OutOfRange {
        kind: EntityKind,
        index: usize,
        count: usize,
    },
    #[error("expected a {expected} identity, got {actual}")]
    WrongKind {
        expected: EntityKind,
        actual: Identity,
    },
    #[error("joint links {parent} and {child} belong to different worlds")]
    CrossWorldJoint { parent: Identity, child: Identity },
    #[error("inconsistent hierarchy: {0}")]
    Inconsistent(String),
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
}

impl RegistryError {
    pub fn not_found(identity: Identity) -> Self {
        Self::NotFound {
            kind: identity.kind(),
            identity,
        }
    }

    /// True for the expected "no such entity" outcomes.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::NameNotFound { .. } | Self::OutOfRange { .. }
        )
    }
}
