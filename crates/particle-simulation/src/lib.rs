//! # Particle Simulation Engine
//!
//! Fixed-step N-body integration with interchangeable backends: an adaptive
//! explicit baseline, sequential velocity-Verlet, and thread-pool,
//! worker-process and GPU-kernel variants of the Verlet update.

pub mod driver;
pub mod error;
pub mod gpu;
pub mod integrator;
pub mod ode;
pub mod params;
pub mod partition;
pub mod process;
pub mod sequential;
pub mod threaded;
pub mod verlet;

pub use driver::*;
pub use error::*;
pub use gpu::GpuVerlet;
pub use integrator::*;
pub use params::*;
pub use partition::*;
pub use process::MultiprocessVerlet;
pub use sequential::{ExplicitBaseline, SequentialVerlet};
pub use threaded::ThreadedVerlet;
