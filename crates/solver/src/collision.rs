use glam::Vec3;
use rapier3d::prelude::{NarrowPhase, Pose as ShapePose, SharedShape};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tether_common::{Pose, SolverError};

/// Collision geometry attached to a rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollisionShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    /// Z-aligned capsule.
    Capsule { radius: f32, half_length: f32 },
    /// Y-aligned cylinder.
    Cylinder { radius: f32, half_length: f32 },
    ConvexHull { points: Vec<Vec3> },
    /// Arbitrary triangle soup. Concave; needs the GImpact algorithm.
    TriangleMesh {
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
    },
    /// Convex children placed in the body frame. Children may not be
    /// meshes or compounds themselves.
    Compound { children: Vec<(Pose, CollisionShape)> },
}

/// Narrow-phase grouping used by the dispatcher to pick an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeClass {
    Convex,
    Concave,
    Compound,
}

impl ShapeClass {
    pub fn name(self) -> &'static str {
        match self {
            Self::Convex => "convex",
            Self::Concave => "concave",
            Self::Compound => "compound",
        }
    }
}

impl CollisionShape {
    pub fn class(&self) -> ShapeClass {
        match self {
            Self::TriangleMesh { .. } => ShapeClass::Concave,
            Self::Compound { .. } => ShapeClass::Compound,
            _ => ShapeClass::Convex,
        }
    }

    /// Every shape class reachable from this shape, children included.
    pub fn classes(&self) -> BTreeSet<ShapeClass> {
        let mut out = BTreeSet::new();
        out.insert(self.class());
        if let Self::Compound { children } = self {
            out.extend(children.iter().map(|(_, child)| child.class()));
        }
        out
    }

    /// Build the rapier geometry for this shape.
    ///
    /// Rejects input parry would panic on: meshes with out-of-range indices,
    /// empty compounds and composite children.
    pub(crate) fn to_shared_shape(&self) -> Result<SharedShape, SolverError> {
        match self {
            Self::Box { half_extents: h } => Ok(SharedShape::cuboid(h.x, h.y, h.z)),
            Self::Sphere { radius } => Ok(SharedShape::ball(*radius)),
            Self::Capsule {
                radius,
                half_length,
            } => Ok(SharedShape::capsule_z(*half_length, *radius)),
            Self::Cylinder {
                radius,
                half_length,
            } => Ok(SharedShape::cylinder(*half_length, *radius)),
            Self::ConvexHull { points } => SharedShape::convex_hull(points).ok_or_else(|| {
                SolverError::InvalidShape(format!(
                    "convex hull of {} points is degenerate",
                    points.len()
                ))
            }),
            Self::TriangleMesh { vertices, indices } => {
                if indices.is_empty() {
                    return Err(SolverError::InvalidShape(
                        "triangle mesh has no triangles".into(),
                    ));
                }
                if let Some(index) = indices
                    .iter()
                    .flatten()
                    .find(|i| **i as usize >= vertices.len())
                {
                    return Err(SolverError::InvalidShape(format!(
                        "triangle index {index} past {} vertices",
                        vertices.len()
                    )));
                }
                SharedShape::trimesh(vertices.clone(), indices.clone())
                    .map_err(|err| SolverError::InvalidShape(format!("{err:?}")))
            }
            Self::Compound { children } => {
                if children.is_empty() {
                    return Err(SolverError::InvalidShape("compound has no children".into()));
                }
                let mut parts = Vec::with_capacity(children.len());
                for (pose, child) in children {
                    if child.class() != ShapeClass::Convex {
                        return Err(SolverError::InvalidShape(format!(
                            "compound child is {}",
                            child.class().name()
                        )));
                    }
                    let placement = ShapePose::from_parts(pose.position, pose.rotation);
                    parts.push((placement, child.to_shared_shape()?));
                }
                Ok(SharedShape::compound(parts))
            }
        }
    }
}

/// Narrow-phase algorithms that can be registered on a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollisionAlgorithm {
    /// Convex-vs-convex (GJK/EPA). Always present.
    ConvexConvex,
    /// Compound decomposition into child pairs. Always present.
    CompoundChildren,
    /// GImpact concave/compound intersection, including mesh-vs-mesh.
    GImpactConcave,
}

impl CollisionAlgorithm {
    fn handles(self, class: ShapeClass) -> bool {
        match self {
            Self::ConvexConvex => class == ShapeClass::Convex,
            Self::CompoundChildren => class == ShapeClass::Compound,
            Self::GImpactConcave => matches!(class, ShapeClass::Concave | ShapeClass::Compound),
        }
    }
}

/// Narrow phase plus the set of algorithms shapes may rely on.
///
/// Rapier can collide every shape class, but a world only accepts shapes
/// whose class has a registered algorithm.
pub struct CollisionDispatcher {
    pub(crate) narrow_phase: NarrowPhase,
    algorithms: BTreeSet<CollisionAlgorithm>,
}

impl std::fmt::Debug for CollisionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionDispatcher")
            .field("algorithms", &self.algorithms)
            .finish()
    }
}

impl Default for CollisionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionDispatcher {
    pub fn new() -> Self {
        Self {
            narrow_phase: NarrowPhase::new(),
            algorithms: BTreeSet::from([
                CollisionAlgorithm::ConvexConvex,
                CollisionAlgorithm::CompoundChildren,
            ]),
        }
    }

    /// Register an extra narrow-phase algorithm. Returns false if it was already registered.
    pub fn register_algorithm(&mut self, algorithm: CollisionAlgorithm) -> bool {
        let added = self.algorithms.insert(algorithm);
        if added {
            tracing::debug!(?algorithm, "registered collision algorithm");
        }
        added
    }

    pub fn has_algorithm(&self, algorithm: CollisionAlgorithm) -> bool {
        self.algorithms.contains(&algorithm)
    }

    pub fn supports(&self, class: ShapeClass) -> bool {
        self.algorithms.iter().any(|a| a.handles(class))
    }

    /// Check every class in `shape` has an algorithm.
    pub fn check_shape(&self, shape: &CollisionShape) -> Result<(), SolverError> {
        match shape.classes().into_iter().find(|c| !self.supports(*c)) {
            Some(class) => Err(SolverError::UnsupportedShape(class.name())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> CollisionShape {
        CollisionShape::TriangleMesh {
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            indices: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn default_dispatcher_rejects_concave() {
        let dispatcher = CollisionDispatcher::new();
        assert!(dispatcher.check_shape(&CollisionShape::Sphere { radius: 1.0 }).is_ok());
        assert_eq!(
            dispatcher.check_shape(&mesh()),
            Err(SolverError::UnsupportedShape("concave"))
        );
    }

    #[test]
    fn gimpact_enables_concave() {
        let mut dispatcher = CollisionDispatcher::new();
        assert!(dispatcher.register_algorithm(CollisionAlgorithm::GImpactConcave));
        assert!(!dispatcher.register_algorithm(CollisionAlgorithm::GImpactConcave));
        assert!(dispatcher.check_shape(&mesh()).is_ok());
        assert!(dispatcher.has_algorithm(CollisionAlgorithm::GImpactConcave));
    }

    #[test]
    fn compound_classes_include_children() {
        let compound = CollisionShape::Compound {
            children: vec![(Pose::default(), CollisionShape::Sphere { radius: 1.0 })],
        };
        let classes = compound.classes();
        assert!(classes.contains(&ShapeClass::Compound));
        assert!(classes.contains(&ShapeClass::Convex));
        assert!(!classes.contains(&ShapeClass::Concave));
    }

    #[test]
    fn convex_shapes_build() {
        let shapes = [
            CollisionShape::Box {
                half_extents: Vec3::splat(0.5),
            },
            CollisionShape::Sphere { radius: 1.0 },
            CollisionShape::Capsule {
                radius: 0.2,
                half_length: 0.5,
            },
            CollisionShape::Cylinder {
                radius: 0.3,
                half_length: 1.0,
            },
            CollisionShape::ConvexHull {
                points: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
            },
        ];
        for shape in &shapes {
            assert!(shape.to_shared_shape().is_ok(), "{shape:?}");
        }
    }

    #[test]
    fn mesh_with_bad_index_is_rejected() {
        let bad = CollisionShape::TriangleMesh {
            vertices: vec![Vec3::ZERO, Vec3::X],
            indices: vec![[0, 1, 2]],
        };
        assert!(matches!(
            bad.to_shared_shape(),
            Err(SolverError::InvalidShape(_))
        ));
        assert!(mesh().to_shared_shape().is_ok());
    }

    #[test]
    fn compound_rejects_composite_children() {
        let nested = CollisionShape::Compound {
            children: vec![(Pose::default(), mesh())],
        };
        assert_eq!(
            nested.to_shared_shape().map(|_| ()),
            Err(SolverError::InvalidShape("compound child is concave".into()))
        );
        let empty = CollisionShape::Compound { children: vec![] };
        assert!(empty.to_shared_shape().is_err());

        let placed = CollisionShape::Compound {
            children: vec![
                (
                    Pose::from_position(Vec3::X),
                    CollisionShape::Sphere { radius: 0.5 },
                ),
                (
                    Pose::from_position(-Vec3::X),
                    CollisionShape::Box {
                        half_extents: Vec3::splat(0.25),
                    },
                ),
            ],
        };
        assert!(placed.to_shared_shape().is_ok());
    }
}
