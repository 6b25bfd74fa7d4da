//! Particle records and the system state store
//!
//! The state is kept as a contiguous array of fixed-stride records so that a
//! half-open index range `[start, end)` maps to one contiguous memory range.
//! Backends hand out such ranges to workers and upload the same bytes to the
//! GPU unchanged.

use bytemuck::{Pod, Zeroable};
use glam::DVec2;

use crate::constants::{RADIUS_PER_MASS, RECORD_STRIDE};
use crate::error::PhysicsError;

/// GPU-compatible flat particle record
/// Layout matches the WGSL `Particle` struct: x, y, vx, vy, radius, mass
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleRecord {
    pub position: [f64; 2],
    pub velocity: [f64; 2],
    pub radius: f64,
    pub mass: f64,
}

const _: () = assert!(std::mem::size_of::<ParticleRecord>() == RECORD_STRIDE * 8);

impl ParticleRecord {
    #[inline]
    pub fn position(&self) -> DVec2 {
        DVec2::from_array(self.position)
    }

    #[inline]
    pub fn velocity(&self) -> DVec2 {
        DVec2::from_array(self.velocity)
    }

    #[inline]
    pub fn set_position(&mut self, position: DVec2) {
        self.position = position.to_array();
    }

    #[inline]
    pub fn set_velocity(&mut self, velocity: DVec2) {
        self.velocity = velocity.to_array();
    }
}

/// One physical body as produced by an emitter or a scenario loader
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub position: DVec2,
    pub velocity: DVec2,
    pub mass: f64,
    pub radius: f64,
    /// Ticks until removal, `None` for bodies that never expire
    pub life_time: Option<u32>,
}

impl Particle {
    /// Create a particle with a mass-derived radius and no expiry
    pub fn new(position: DVec2, velocity: DVec2, mass: f64) -> Self {
        Self {
            position,
            velocity,
            mass,
            radius: RADIUS_PER_MASS * mass,
            life_time: None,
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_life_time(mut self, ticks: u32) -> Self {
        self.life_time = Some(ticks);
        self
    }

    /// Check the store invariants for a particle placed at `index`
    pub fn validate(&self, index: usize) -> Result<(), PhysicsError> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(PhysicsError::InvalidMass {
                index,
                mass: self.mass,
            });
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            return Err(PhysicsError::InvalidRadius {
                index,
                radius: self.radius,
            });
        }
        if !(self.position.is_finite() && self.velocity.is_finite()) {
            return Err(PhysicsError::NonFiniteState { index });
        }
        Ok(())
    }

    pub fn record(&self) -> ParticleRecord {
        ParticleRecord {
            position: self.position.to_array(),
            velocity: self.velocity.to_array(),
            radius: self.radius,
            mass: self.mass,
        }
    }
}

/// Read access to an indexed set of particle records
///
/// Implemented by the plain record slice and by the shared buffers of the
/// parallel backends, so the force model is written once.
pub trait ParticleView {
    fn len(&self) -> usize;

    fn record(&self, index: usize) -> ParticleRecord;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ParticleView for [ParticleRecord] {
    #[inline]
    fn len(&self) -> usize {
        <[ParticleRecord]>::len(self)
    }

    #[inline]
    fn record(&self, index: usize) -> ParticleRecord {
        self[index]
    }
}

/// Ordered collection of particles, indexed `0..len`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemState {
    records: Vec<ParticleRecord>,
    life_times: Vec<Option<u32>>,
}

impl SystemState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a validated state; the first invalid particle is reported
    pub fn from_particles<I>(particles: I) -> Result<Self, PhysicsError>
    where
        I: IntoIterator<Item = Particle>,
    {
        let mut state = Self::new();
        for particle in particles {
            state.push(particle)?;
        }
        Ok(state)
    }

    /// Reassemble a state from raw buffers (e.g. a GPU readback)
    pub fn from_parts(
        records: Vec<ParticleRecord>,
        life_times: Vec<Option<u32>>,
    ) -> Result<Self, PhysicsError> {
        if records.len() != life_times.len() {
            return Err(PhysicsError::LengthMismatch {
                records: records.len(),
                life_times: life_times.len(),
            });
        }
        Ok(Self {
            records,
            life_times,
        })
    }

    pub fn push(&mut self, particle: Particle) -> Result<(), PhysicsError> {
        particle.validate(self.records.len())?;
        self.records.push(particle.record());
        self.life_times.push(particle.life_time);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ParticleRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [ParticleRecord] {
        &mut self.records
    }

    pub fn life_times(&self) -> &[Option<u32>] {
        &self.life_times
    }

    /// Flat `f64` view, `RECORD_STRIDE` values per particle
    pub fn as_flat(&self) -> &[f64] {
        bytemuck::cast_slice(&self.records)
    }

    pub fn particle(&self, index: usize) -> Particle {
        let record = &self.records[index];
        Particle {
            position: record.position(),
            velocity: record.velocity(),
            mass: record.mass,
            radius: record.radius,
            life_time: self.life_times[index],
        }
    }

    pub fn particles(&self) -> impl Iterator<Item = Particle> + '_ {
        (0..self.len()).map(move |i| self.particle(i))
    }

    /// Drop particles whose lifetime reached zero, keeping the order of the rest.
    /// Returns the number removed.
    pub fn remove_expired(&mut self) -> usize {
        let before = self.records.len();
        if self.life_times.iter().all(|life| *life != Some(0)) {
            return 0;
        }

        let mut records = Vec::with_capacity(before);
        let mut life_times = Vec::with_capacity(before);
        for (record, life) in self.records.iter().zip(&self.life_times) {
            if *life != Some(0) {
                records.push(*record);
                life_times.push(*life);
            }
        }
        self.records = records;
        self.life_times = life_times;
        before - self.records.len()
    }

    /// Count one tick off every bounded lifetime
    pub fn tick_life_times(&mut self) {
        for life in self.life_times.iter_mut().flatten() {
            *life = life.saturating_sub(1);
        }
    }

    /// Force-free advance used when fewer than two bodies remain
    pub fn drift(&mut self, dt: f64) {
        for record in &mut self.records {
            let position = record.position() + record.velocity() * dt;
            record.set_position(position);
        }
    }

    /// Σ mass · velocity
    pub fn total_momentum(&self) -> DVec2 {
        self.records
            .iter()
            .fold(DVec2::ZERO, |acc, r| acc + r.velocity() * r.mass)
    }

    pub fn total_mass(&self) -> f64 {
        self.records.iter().map(|r| r.mass).sum()
    }
}

impl ParticleView for SystemState {
    #[inline]
    fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    fn record(&self, index: usize) -> ParticleRecord {
        self.records[index]
    }
}
