use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name reported for the engine root.
pub const ENGINE_NAME: &str = "tether";

/// The kind of entity an [`Identity`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Engine,
    World,
    Model,
    Link,
    Joint,
    Shape,
}

impl EntityKind {
    /// Fixed descriptive string identifying this engine's implementation of the kind.
    pub fn descriptor(self) -> &'static str {
        match self {
            Self::Engine => ENGINE_NAME,
            Self::World => "tether-world",
            Self::Model => "tether-model",
            Self::Link => "tether-link",
            Self::Joint => "tether-joint",
            Self::Shape => "tether-shape",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Engine => "engine",
            Self::World => "world",
            Self::Model => "model",
            Self::Link => "link",
            Self::Joint => "joint",
            Self::Shape => "shape",
        };
        f.write_str(s)
    }
}

/// Opaque handle to one entity.
///
/// An identity is a slot in the per-kind arena plus the slot's generation at
/// the time the entity was inserted. Slots are recycled after removal with a
/// bumped generation, so an identity held past its entity's removal never
/// resolves to the slot's next occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    kind: EntityKind,
    slot: u32,
    generation: u32,
}

impl Identity {
    /// The single engine root. Every manager has exactly one engine.
    pub const ENGINE: Identity = Identity {
        kind: EntityKind::Engine,
        slot: 0,
        generation: 0,
    };

    pub const fn new(kind: EntityKind, slot: u32, generation: u32) -> Self {
        Self {
            kind,
            slot,
            generation,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}v{}", self.kind, self.slot, self.generation)
    }
}

/// Rigid placement: position and orientation. Bodies carry no scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}
