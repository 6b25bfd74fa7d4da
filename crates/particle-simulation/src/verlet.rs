//! Velocity-Verlet update kernels shared by the CPU backends
//!
//! One tick is two phases over the whole system:
//!
//! 1. position phase, reading a frozen pre-step view:
//!    `x' = x + v·Δt + ½·a(t)·Δt²`
//! 2. velocity phase, reading the positions written by phase 1:
//!    `v' = v + ½·(a(t) + a(t+Δt))·Δt`
//!
//! The phase functions work on one particle (or one index range) so that a
//! backend can split the system however it likes; the arithmetic is the same
//! for every backend.

use std::ops::Range;

use glam::DVec2;
use particle_physics::{GravityModel, ParticleRecord, ParticleView, PhysicsError};

/// New position of particle `index` and the acceleration a(t) used for it
#[inline]
pub fn advance_position<V>(
    model: &GravityModel,
    previous: &V,
    index: usize,
    dt: f64,
) -> Result<(DVec2, DVec2), PhysicsError>
where
    V: ParticleView + ?Sized,
{
    let acceleration = model.checked_acceleration(previous, index)?;
    let record = previous.record(index);
    let position =
        record.position() + record.velocity() * dt + acceleration * (0.5 * dt * dt);
    Ok((position, acceleration))
}

/// New velocity of particle `index` given a(t) from the position phase
#[inline]
pub fn advance_velocity<V>(
    model: &GravityModel,
    current: &V,
    index: usize,
    previous_acceleration: DVec2,
    dt: f64,
) -> Result<DVec2, PhysicsError>
where
    V: ParticleView + ?Sized,
{
    let acceleration = model.checked_acceleration(current, index)?;
    Ok(current.record(index).velocity() + (previous_acceleration + acceleration) * (0.5 * dt))
}

/// Position phase over `range`. Returns the updated records of the range and
/// stores a(t) for each of them in `accelerations`.
pub fn position_phase<V>(
    model: &GravityModel,
    previous: &V,
    range: Range<usize>,
    dt: f64,
    accelerations: &mut Vec<DVec2>,
) -> Result<Vec<ParticleRecord>, PhysicsError>
where
    V: ParticleView + ?Sized,
{
    accelerations.clear();
    let mut updated = Vec::with_capacity(range.len());
    for i in range {
        let (position, acceleration) = advance_position(model, previous, i, dt)?;
        let mut record = previous.record(i);
        record.set_position(position);
        updated.push(record);
        accelerations.push(acceleration);
    }
    Ok(updated)
}

/// Velocity phase over `range`, `accelerations[k]` belonging to `range.start + k`
pub fn velocity_phase<V>(
    model: &GravityModel,
    current: &V,
    range: Range<usize>,
    dt: f64,
    accelerations: &[DVec2],
) -> Result<Vec<ParticleRecord>, PhysicsError>
where
    V: ParticleView + ?Sized,
{
    let mut updated = Vec::with_capacity(range.len());
    for (i, previous_acceleration) in range.zip(accelerations) {
        let velocity = advance_velocity(model, current, i, *previous_acceleration, dt)?;
        let mut record = current.record(i);
        record.set_velocity(velocity);
        updated.push(record);
    }
    Ok(updated)
}
