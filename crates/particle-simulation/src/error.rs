//! Error types for simulation runs

use std::io;

use particle_physics::PhysicsError;
use thiserror::Error;

use crate::ode::SolverError;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("tick count must be at least 1, got {0}")]
    InvalidTickCount(usize),

    #[error("max time must be positive and finite, got {0}")]
    InvalidTimeSpan(f64),

    #[error("at least one worker is required")]
    NoWorkers,

    /// Raised before any computation starts
    #[error("{ticks} ticks x {particles} particles needs {bytes} bytes, limit is {limit}")]
    ResourceExhausted {
        ticks: usize,
        particles: usize,
        bytes: u64,
        limit: u64,
    },

    /// Invalid input or a degenerate configuration (non-finite acceleration)
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error("adaptive solver failed on particle {index}: {source}")]
    Solver {
        index: usize,
        #[source]
        source: SolverError,
    },

    #[error("failed to spawn worker {worker}: {source}")]
    WorkerSpawn {
        worker: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to build worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A worker thread or process died or stopped answering mid-tick
    #[error("worker {worker} failed: {reason}")]
    WorkerFailed { worker: usize, reason: String },

    #[error("worker protocol violation: {0}")]
    Protocol(String),

    #[error("no GPU adapter available: {0}")]
    GpuUnavailable(String),

    #[error("GPU adapter '{0}' does not support 64-bit float shaders")]
    GpuUnsupported(String),

    #[error("GPU execution failed: {0}")]
    Gpu(String),

    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SimError {
    /// True when the failure comes from the input rather than the machinery
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            SimError::Physics(PhysicsError::NonFiniteAcceleration { .. })
        )
    }
}
