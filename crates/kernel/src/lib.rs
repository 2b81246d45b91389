//! Entity kernel: identities, hierarchy and lifecycle of physics entities.
//!
//! Tracks Engine → World → Model → Link → {Joint, Shape}, keeps the solver's
//! live bodies and constraints in step with the registry, and removes Models
//! together with everything that depends on them.
//!
//! # Invariants
//! - Every hierarchy entry's parent is a live entity.
//! - A body, shape or constraint is registered with its world's solver iff its
//!   record exists. Records are erased only after the solver releases them.
//! - Model removal either completes fully or fails before touching any state.
//! - Identities of removed entities never resolve again.

mod accessors;
pub mod arena;
pub mod hierarchy;
mod manager;
pub mod records;
mod removal;

pub use arena::Arena;
pub use hierarchy::Hierarchy;
pub use manager::EntityManager;
pub use removal::RemovalReport;
pub use tether_common::{ENGINE_NAME, EntityKind, Identity, Pose, RegistryError};
