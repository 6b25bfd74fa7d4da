//! # Particle Bench
//!
//! Benchmark harness for the simulation backends: identical initial
//! conditions are fed to every backend, trajectories are compared against a
//! reference (accuracy) and wall time is averaged per particle count
//! (runtime and speedup).

pub mod accuracy;
pub mod emitter;
pub mod error;
pub mod report;
pub mod runtime;
pub mod scenario;

pub use accuracy::*;
pub use emitter::*;
pub use error::*;
pub use report::*;
pub use runtime::*;
pub use scenario::*;
