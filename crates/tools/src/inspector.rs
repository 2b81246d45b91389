use serde::Serialize;
use tether_common::{Identity, RegistryError};
use tether_kernel::EntityManager;

/// Hierarchy inspector for developer tooling.
///
/// Walks the manager through its public accessors only, so what it prints is
/// exactly what a host would see.
pub struct HierarchyInspector;

impl HierarchyInspector {
    /// Summarise one world: entity counts and what its solver holds.
    pub fn summary(
        manager: &EntityManager,
        world: Identity,
    ) -> Result<WorldSummary, RegistryError> {
        let mut links = 0;
        let mut joints = 0;
        let mut shapes = 0;
        let models = manager.model_count(world)?;
        for i in 0..models {
            let model = manager.model(world, i)?;
            let link_count = manager.link_count(model)?;
            links += link_count;
            joints += manager.joint_count(model)?;
            for j in 0..link_count {
                shapes += manager.shape_count(manager.link(model, j)?)?;
            }
        }
        let dynamics = manager.solver(world)?.dynamics();
        Ok(WorldSummary {
            world,
            name: manager.world_name(world)?.to_string(),
            models,
            links,
            joints,
            shapes,
            bodies: dynamics.body_count(),
            constraints: dynamics.constraint_count(),
            colliders: dynamics.shape_count(),
        })
    }

    /// Summaries of every world under the engine.
    pub fn summaries(manager: &EntityManager) -> Result<Vec<WorldSummary>, RegistryError> {
        let engine = manager.engine();
        (0..manager.world_count(engine)?)
            .map(|i| Self::summary(manager, manager.world(engine, i)?))
            .collect()
    }

    /// Indented tree of the whole hierarchy, one entity per line.
    pub fn tree(manager: &EntityManager) -> Result<Vec<String>, RegistryError> {
        let engine = manager.engine();
        let mut lines = vec![format!("{} [{engine}]", manager.engine_name(engine)?)];
        for w in 0..manager.world_count(engine)? {
            let world = manager.world(engine, w)?;
            lines.push(format!("  world {} [{world}]", manager.world_name(world)?));
            for m in 0..manager.model_count(world)? {
                let model = manager.model(world, m)?;
                lines.push(format!("    model {} [{model}]", manager.model_name(model)?));
                for l in 0..manager.link_count(model)? {
                    let link = manager.link(model, l)?;
                    lines.push(format!("      link {} [{link}]", manager.link_name(link)?));
                    for s in 0..manager.shape_count(link)? {
                        let shape = manager.shape(link, s)?;
                        let name = manager.shape_name(shape)?;
                    lines.push(format!("        shape {name} [{shape}]"));
                    }
                }
                for j in 0..manager.joint_count(model)? {
                    let joint = manager.joint(model, j)?;
                    let (parent, child) = manager.joint_links(joint)?;
                    lines.push(format!(
                        "      joint {} [{joint}] {} -> {}",
                        manager.joint_name(joint)?,
                        manager.link_name(parent)?,
                        manager.link_name(child)?
                    ));
                }
            }
        }
        Ok(lines)
    }
}

/// Entity and solver counts for one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldSummary {
    pub world: Identity,
    pub name: String,
    pub models: usize,
    pub links: usize,
    pub joints: usize,
    pub shapes: usize,
    pub bodies: usize,
    pub constraints: usize,
    pub colliders: usize,
}

impl WorldSummary {
    /// Registry and solver agree on how many bodies, constraints and colliders exist.
    pub fn in_sync(&self) -> bool {
        self.links == self.bodies
            && self.joints == self.constraints
            && self.shapes == self.colliders
    }
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World {} [{}]: models={} links={} joints={} shapes={} \
             bodies={} constraints={} colliders={}",
            self.name,
            self.world,
            self.models,
            self.links,
            self.joints,
            self.shapes,
            self.bodies,
            self.constraints,
            self.colliders
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_solver::{CollisionShape, JointDesc, JointType, RigidBodyDesc};

    fn populated() -> (EntityManager, Identity, Identity) {
        let mut em = EntityManager::new();
        let world = em.construct_empty_world(em.engine(), "W1").unwrap();
        let model = em.construct_model(world, "M1").unwrap();
        let l1 = em.construct_link(model, "L1", RigidBodyDesc::default()).unwrap();
        let l2 = em.construct_link(model, "L2", RigidBodyDesc::default()).unwrap();
        em.construct_joint(l1, l2, "J1", JointDesc::new(JointType::Fixed))
            .unwrap();
        em.attach_collision(l2, "C1", CollisionShape::Sphere { radius: 1.0 })
            .unwrap();
        (em, world, model)
    }

    #[test]
    fn summary_empty_world() {
        let mut em = EntityManager::new();
        let world = em.construct_empty_world(em.engine(), "empty").unwrap();
        let summary = HierarchyInspector::summary(&em, world).unwrap();
        assert_eq!(summary.models, 0);
        assert_eq!(summary.bodies, 0);
        assert!(summary.in_sync());
    }

    #[test]
    fn summary_with_entities() {
        let (em, world, _) = populated();
        let summary = HierarchyInspector::summary(&em, world).unwrap();
        assert_eq!(summary.models, 1);
        assert_eq!(summary.links, 2);
        assert_eq!(summary.joints, 1);
        assert_eq!(summary.shapes, 1);
        assert_eq!(summary.bodies, 2);
        assert_eq!(summary.constraints, 1);
        assert_eq!(summary.colliders, 1);
        assert!(summary.in_sync());
    }

    #[test]
    fn summary_after_removal() {
        let (mut em, world, model) = populated();
        assert!(em.remove_model(model));
        let summary = HierarchyInspector::summary(&em, world).unwrap();
        assert_eq!(summary.models, 0);
        assert_eq!(summary.bodies, 0);
        assert_eq!(summary.constraints, 0);
        assert_eq!(summary.colliders, 0);
        assert!(summary.in_sync());
    }

    #[test]
    fn summary_unknown_world() {
        let (em, _, model) = populated();
        assert!(HierarchyInspector::summary(&em, model).is_err());
    }

    #[test]
    fn tree_lists_every_entity() {
        let (em, _, _) = populated();
        let tree = HierarchyInspector::tree(&em).unwrap();
        assert_eq!(tree.len(), 7);
        assert!(tree[0].starts_with("tether"));
        assert!(tree.iter().any(|l| l.contains("joint J1") && l.contains("L1 -> L2")));
        assert!(tree.iter().any(|l| l.trim_start().starts_with("shape C1")));
    }

    #[test]
    fn summary_display() {
        let (em, world, _) = populated();
        let s = HierarchyInspector::summary(&em, world).unwrap().to_string();
        assert!(s.contains("World W1"));
        assert!(s.contains("links=2"));
    }

    #[test]
    fn summaries_cover_all_worlds() {
        let (mut em, _, _) = populated();
        em.construct_empty_world(em.engine(), "W2").unwrap();
        let all = HierarchyInspector::summaries(&em).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].name, "W2");
    }
}
