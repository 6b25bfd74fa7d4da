//! Error types for the benchmark harness

use std::io;
use std::path::PathBuf;

use particle_physics::PhysicsError;
use particle_simulation::{Backend, SimError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("no backends selected")]
    NoBackends,

    #[error("no particle counts given")]
    NoParticleCounts,

    #[error("iteration count must be at least 1")]
    NoIterations,

    /// Without the reference trajectory there is nothing to compare against
    #[error("reference backend {backend} failed: {source}")]
    ReferenceFailed {
        backend: Backend,
        #[source]
        source: SimError,
    },

    #[error("scenario {path}: {reason}")]
    Scenario { path: PathBuf, reason: String },

    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error(transparent)]
    Simulation(#[from] SimError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A backend that could not finish a run; the comparison carries on without it
#[derive(Clone, Debug, PartialEq)]
pub struct BackendFailure {
    pub backend: Backend,
    /// Particle count of the failed run, when the comparison sweeps counts
    pub particle_count: Option<usize>,
    pub reason: String,
}
