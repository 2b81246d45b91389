//! Developer tooling: read-only views of an entity manager for debugging and CLIs.
//!
//! # Invariants
//! - Tools never mutate the manager.

mod inspector;

pub use inspector::{HierarchyInspector, WorldSummary};
