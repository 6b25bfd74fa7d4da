//! Errors raised by the particle state store and the force model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Mass must be strictly positive and finite
    #[error("particle {index}: mass must be positive and finite, got {mass}")]
    InvalidMass { index: usize, mass: f64 },

    /// Radius must be non-negative and finite
    #[error("particle {index}: radius must be non-negative and finite, got {radius}")]
    InvalidRadius { index: usize, radius: f64 },

    /// Position or velocity contains NaN/Inf
    #[error("particle {index}: position and velocity must be finite")]
    NonFiniteState { index: usize },

    /// Acceleration evaluated to NaN/Inf, typically two coincident particles
    #[error("non-finite acceleration on particle {index} (degenerate configuration)")]
    NonFiniteAcceleration { index: usize },

    #[error("state buffers disagree: {records} records but {life_times} life times")]
    LengthMismatch { records: usize, life_times: usize },
}
