use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tether_common::{EntityKind, Identity, Pose};
use tether_kernel::EntityManager;
use tether_solver::{CollisionShape, JointDesc, JointType, RigidBodyDesc, SolverConfig};
use tether_tools::HierarchyInspector;

#[derive(Parser)]
#[command(name = "tether-cli", about = "CLI tool for tether entity management")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print summaries as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine name and per-kind descriptors
    Info,
    /// Build chain models, optionally remove one, and print the result
    Demo {
        /// Number of models to build
        #[arg(short, long, default_value = "3")]
        models: usize,
        /// Links per model, each jointed to the previous one
        #[arg(short, long, default_value = "4")]
        links: usize,
        /// Name of a model to remove afterwards (models are named model_0, model_1, ...)
        #[arg(short, long)]
        remove: Option<String>,
        /// Vertical gravity
        #[arg(long, default_value = "-9.8")]
        gravity: f32,
        /// Solver steps to run before and after the removal
        #[arg(long, default_value = "0")]
        steps: u32,
    },
    /// Remove a model joined to another model and show what survives
    CrossModel,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tether-cli v{}", env!("CARGO_PKG_VERSION"));
            for kind in [
                EntityKind::Engine,
                EntityKind::World,
                EntityKind::Model,
                EntityKind::Link,
                EntityKind::Joint,
                EntityKind::Shape,
            ] {
                println!("{kind}: {}", kind.descriptor());
            }
        }
        Commands::Demo {
            models,
            links,
            remove,
            gravity,
            steps,
        } => {
            let mut em = EntityManager::new();
            let config = SolverConfig {
                gravity: glam::Vec3::new(0.0, 0.0, gravity),
                ..SolverConfig::default()
            };
            let world = em.construct_world(em.engine(), "demo", &config)?;
            for m in 0..models {
                build_chain(&mut em, world, &format!("model_{m}"), links, m as f32)?;
            }
            step(&mut em, world, steps)?;
            report(&em, cli.json)?;

            if let Some(name) = remove {
                if em.remove_model_by_name(world, &name) {
                    tracing::info!(model = %name, "removed");
                } else {
                    tracing::warn!(model = %name, "nothing removed");
                }
                step(&mut em, world, steps)?;
                report(&em, cli.json)?;
            }
            em.validate().context("registry out of sync with solver")?;
        }
        Commands::CrossModel => {
            let mut em = EntityManager::new();
            let world = em.construct_empty_world(em.engine(), "W1")?;
            let a = build_chain(&mut em, world, "A", 2, 0.0)?;
            let b = build_chain(&mut em, world, "B", 2, 1.0)?;
            let bridge_parent = em.link(a, 1)?;
            let bridge_child = em.link(b, 0)?;
            em.construct_joint(
                bridge_parent,
                bridge_child,
                "bridge",
                JointDesc::new(JointType::Ball),
            )?;
            report(&em, cli.json)?;

            let removal = em.try_remove_model(a)?;
            tracing::info!(
                joints = removal.joints,
                collisions = removal.collisions,
                links = removal.links,
                "removed A"
            );
            report(&em, cli.json)?;
            em.validate().context("registry out of sync with solver")?;
        }
    }

    Ok(())
}

/// A model whose links hang in a row along X, each revolute-jointed to the previous one.
fn build_chain(
    em: &mut EntityManager,
    world: Identity,
    name: &str,
    links: usize,
    offset: f32,
) -> anyhow::Result<Identity> {
    let model = em.construct_model(world, name)?;
    let mut previous: Option<Identity> = None;
    for i in 0..links {
        let desc = RigidBodyDesc {
            pose: Pose::from_position(glam::Vec3::new(i as f32, offset * 2.0, 0.0)),
            ..RigidBodyDesc::default()
        };
        let link = em.construct_link(model, format!("{name}_link_{i}"), desc)?;
        em.attach_collision(
            link,
            format!("{name}_box_{i}"),
            CollisionShape::Box {
                half_extents: glam::Vec3::splat(0.25),
            },
        )?;
        if let Some(parent) = previous {
            let mut joint = JointDesc::new(JointType::Revolute { axis: glam::Vec3::Z });
            joint.parent_anchor = glam::Vec3::new(0.5, 0.0, 0.0);
            joint.child_anchor = glam::Vec3::new(-0.5, 0.0, 0.0);
            em.construct_joint(parent, link, format!("{name}_joint_{i}"), joint)?;
        }
        previous = Some(link);
    }
    Ok(model)
}

fn step(em: &mut EntityManager, world: Identity, steps: u32) -> anyhow::Result<()> {
    for _ in 0..steps {
        em.step_world(world)?;
    }
    if steps > 0 {
        tracing::debug!(%world, steps, "stepped world");
    }
    Ok(())
}

fn report(em: &EntityManager, json: bool) -> anyhow::Result<()> {
    let summaries = HierarchyInspector::summaries(em)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for line in HierarchyInspector::tree(em)? {
            println!("{line}");
        }
        for summary in &summaries {
            println!("{summary}");
        }
    }
    Ok(())
}
