//! Pairwise Newtonian gravity
//!
//! a_i = Σ_{j≠i} G · m_j · (x_j − x_i) / |x_j − x_i|³
//!
//! Contributions are always summed in ascending `j` order. Every CPU backend
//! goes through these functions, so reordering particles across workers never
//! changes a result bit.

use glam::DVec2;

use crate::constants::G;
use crate::error::PhysicsError;
use crate::particle::{ParticleRecord, ParticleView};

/// Gravity evaluator with the gravitational constant injected
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GravityModel {
    pub gravitational_constant: f64,
    /// Skip pairs whose separation does not exceed the sum of their radii
    pub collision_gate: bool,
}

impl Default for GravityModel {
    fn default() -> Self {
        Self {
            gravitational_constant: G,
            collision_gate: false,
        }
    }
}

impl GravityModel {
    pub fn new(gravitational_constant: f64) -> Self {
        Self {
            gravitational_constant,
            ..Self::default()
        }
    }

    pub fn with_collision_gate(mut self, enabled: bool) -> Self {
        self.collision_gate = enabled;
        self
    }

    /// Acceleration that `source` induces on a body at `position` with `radius`
    #[inline]
    pub fn pair_acceleration(&self, position: DVec2, radius: f64, source: &ParticleRecord) -> DVec2 {
        let r_vec = source.position() - position;
        let r = r_vec.length();

        if self.collision_gate && r <= radius + source.radius {
            return DVec2::ZERO;
        }

        r_vec * (self.gravitational_constant * source.mass / (r * r * r))
    }

    /// Acceleration on particle `index` as if it sat at `position`
    pub fn acceleration_at<V>(&self, view: &V, index: usize, position: DVec2) -> DVec2
    where
        V: ParticleView + ?Sized,
    {
        let radius = view.record(index).radius;
        let mut acceleration = DVec2::ZERO;
        for j in 0..view.len() {
            if j != index {
                acceleration += self.pair_acceleration(position, radius, &view.record(j));
            }
        }
        acceleration
    }

    /// Acceleration on particle `index` at its stored position
    #[inline]
    pub fn acceleration<V>(&self, view: &V, index: usize) -> DVec2
    where
        V: ParticleView + ?Sized,
    {
        self.acceleration_at(view, index, view.record(index).position())
    }

    /// Like [`GravityModel::acceleration`], but refuses to return NaN/Inf
    pub fn checked_acceleration<V>(&self, view: &V, index: usize) -> Result<DVec2, PhysicsError>
    where
        V: ParticleView + ?Sized,
    {
        finite(self.acceleration(view, index), index)
    }

    /// Full O(N²) sweep
    pub fn accelerations<V>(&self, view: &V) -> Result<Vec<DVec2>, PhysicsError>
    where
        V: ParticleView + ?Sized,
    {
        (0..view.len())
            .map(|i| self.checked_acceleration(view, i))
            .collect()
    }
}

/// Reject a non-finite acceleration computed for particle `index`
#[inline]
pub fn finite(acceleration: DVec2, index: usize) -> Result<DVec2, PhysicsError> {
    if acceleration.is_finite() {
        Ok(acceleration)
    } else {
        Err(PhysicsError::NonFiniteAcceleration { index })
    }
}
