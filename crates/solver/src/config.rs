use glam::Vec3;
use rapier3d::prelude::IntegrationParameters;
use serde::{Deserialize, Serialize};

/// Construction parameters for a solver world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// World gravity. Z is up.
    pub gravity: Vec3,
    /// Constraint solver iterations per step.
    pub solver_iterations: u32,
    /// Error reduction parameter for joint drift correction.
    pub erp: f32,
    /// Fixed step length in seconds.
    pub timestep: f32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.0, -9.8),
            solver_iterations: 10,
            erp: 0.2,
            timestep: 1.0 / 60.0,
        }
    }
}

impl SolverConfig {
    /// Integration parameters handed to the rapier pipeline.
    pub fn integration_parameters(&self) -> IntegrationParameters {
        IntegrationParameters {
            dt: self.timestep,
            ..IntegrationParameters::default()
        }
    }
}

/// Per-world tuning read by the constraint solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverInfo {
    /// Global constraint force mixing. Zero makes constraints hard.
    pub global_cfm: f32,
    pub erp: f32,
    pub num_iterations: u32,
}

impl Default for SolverInfo {
    fn default() -> Self {
        Self {
            global_cfm: 1.0e-5,
            erp: 0.2,
            num_iterations: 10,
        }
    }
}

impl SolverInfo {
    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            erp: config.erp,
            num_iterations: config.solver_iterations,
            ..Self::default()
        }
    }
}
