//! # Particle Physics
//!
//! Particle state store and the pairwise Newtonian gravity model shared by
//! every integrator backend.

pub mod constants;
pub mod error;
pub mod forces;
pub mod particle;

pub use constants::*;
pub use error::*;
pub use forces::*;
pub use particle::*;
