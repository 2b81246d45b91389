//! Shared types for the tether workspace: entity identities, kinds, poses and
//! the error taxonomy used by the solver and the kernel.

mod error;
mod types;

pub use error::{RegistryError, SolverError};
pub use types::{ENGINE_NAME, EntityKind, Identity, Pose};
