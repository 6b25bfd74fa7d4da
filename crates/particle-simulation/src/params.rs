//! Runtime configuration for simulation runs
//!
//! Everything derives `Deserialize` with field defaults, so a YAML file only
//! needs the keys it overrides:
//!
//! ```yaml
//! force:
//!   gravitational_constant: 1.0
//!   collision_gate: false
//! solver:
//!   rtol: 1.0e-10
//! workers: 4
//! worker_command:
//!   program: target/release/particle-worker
//!   args: []
//! memory_limit_bytes: 1073741824
//! ```

use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use particle_physics::{GravityModel, G};
use serde::Deserialize;

use crate::error::SimError;

/// Force model settings, injected into [`GravityModel`]
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub gravitational_constant: f64,
    /// Skip pairs closer than the sum of their radii
    pub collision_gate: bool,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            gravitational_constant: G,
            collision_gate: false,
        }
    }
}

impl ForceConfig {
    pub fn model(&self) -> GravityModel {
        GravityModel::new(self.gravitational_constant).with_collision_gate(self.collision_gate)
    }
}

/// Error control for the adaptive explicit baseline
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverTolerances {
    pub rtol: f64,
    pub atol: f64,
    /// First trial step; `None` tries the whole tick at once
    pub initial_step: Option<f64>,
    /// Accepted + rejected steps allowed per particle per tick
    pub max_steps: usize,
}

impl Default for SolverTolerances {
    fn default() -> Self {
        Self {
            rtol: 1.49012e-8,
            atol: 1.49012e-8,
            initial_step: None,
            max_steps: 500,
        }
    }
}

/// How to launch one process-backend worker
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Name of the standalone worker binary shipped with this crate
pub const WORKER_PROGRAM: &str = "particle-worker";

impl Default for WorkerCommand {
    /// The standalone worker binary, looked up on `PATH`
    fn default() -> Self {
        Self::new(WORKER_PROGRAM)
    }
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub force: ForceConfig,
    pub solver: SolverTolerances,
    /// Worker threads / processes for the parallel backends
    pub workers: usize,
    pub worker_command: WorkerCommand,
    /// Upper bound for the snapshot buffer of one run
    pub memory_limit_bytes: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            force: ForceConfig::default(),
            solver: SolverTolerances::default(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            worker_command: WorkerCommand::default(),
            memory_limit_bytes: 2 << 30,
        }
    }
}

impl SimulationConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, SimError> {
        serde_yaml::from_str(text).map_err(|e| SimError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_force(mut self, force: ForceConfig) -> Self {
        self.force = force;
        self
    }

    pub fn with_worker_command(mut self, command: WorkerCommand) -> Self {
        self.worker_command = command;
        self
    }
}

/// Uniform block of the GPU Verlet kernel (matches WGSL `Params`)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuParams {
    // Group 1: sizes
    pub particle_count: u32,
    pub tick_count: u32,
    // Group 2: flags
    pub collision_gate: u32,
    pub _padding: u32,
    // Group 3: integration
    pub dt: f64,
    pub gravitational_constant: f64,
}

impl GpuParams {
    pub fn new(model: &GravityModel, particle_count: u32, tick_count: u32, dt: f64) -> Self {
        Self {
            particle_count,
            tick_count,
            collision_gate: model.collision_gate as u32,
            _padding: 0,
            dt,
            gravitational_constant: model.gravitational_constant,
        }
    }
}
