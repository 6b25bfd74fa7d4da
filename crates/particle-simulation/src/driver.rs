//! Run driver: validates a request, sizes the snapshot buffer and hands the
//! ticks to a backend

use std::time::Instant;

use particle_physics::{ParticleRecord, SystemState};

use crate::error::SimError;
use crate::integrator::{Backend, Integrator, Trajectory};
use crate::params::SimulationConfig;

/// Bytes one particle occupies in one stored snapshot
pub const SNAPSHOT_BYTES_PER_PARTICLE: u64 =
    (std::mem::size_of::<ParticleRecord>() + std::mem::size_of::<Option<u32>>()) as u64;

/// Trajectory plus how long the backend took to produce it
#[derive(Clone, Debug)]
pub struct RunOutput {
    pub trajectory: Trajectory,
    /// Wall time of the integration only, backend construction excluded
    pub elapsed_secs: f64,
}

/// Step size for a run of `tick_count` snapshots spanning `max_time`
pub fn time_step(max_time: f64, tick_count: usize) -> Result<f64, SimError> {
    if tick_count < 1 {
        return Err(SimError::InvalidTickCount(tick_count));
    }
    if !(max_time.is_finite() && max_time > 0.0) {
        return Err(SimError::InvalidTimeSpan(max_time));
    }
    Ok(max_time / tick_count as f64)
}

#[derive(Clone, Debug, Default)]
pub struct Simulation {
    pub config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Refuse runs whose snapshots would not fit in the memory budget
    pub fn check_memory(&self, particles: usize, tick_count: usize) -> Result<u64, SimError> {
        let limit = self.config.memory_limit_bytes;
        let bytes = (particles as u64)
            .checked_mul(tick_count as u64)
            .and_then(|n| n.checked_mul(SNAPSHOT_BYTES_PER_PARTICLE));
        match bytes {
            Some(bytes) if bytes <= limit => Ok(bytes),
            bytes => Err(SimError::ResourceExhausted {
                ticks: tick_count,
                particles,
                bytes: bytes.unwrap_or(u64::MAX),
                limit,
            }),
        }
    }

    /// Step size for the request, once the request is known to fit in memory
    fn admit(
        &self,
        initial: &SystemState,
        max_time: f64,
        tick_count: usize,
    ) -> Result<f64, SimError> {
        let dt = time_step(max_time, tick_count)?;
        self.check_memory(initial.len(), tick_count)?;
        Ok(dt)
    }

    /// Build a fresh `backend` and run it from `initial`. The request is
    /// checked before the backend is constructed, so a rejected run never
    /// spawns workers or touches the GPU.
    pub fn run(
        &self,
        initial: &SystemState,
        max_time: f64,
        tick_count: usize,
        backend: Backend,
    ) -> Result<RunOutput, SimError> {
        let dt = self.admit(initial, max_time, tick_count)?;
        let mut integrator = backend.create(&self.config)?;
        self.execute(integrator.as_mut(), initial, dt, tick_count)
    }

    /// Run an already constructed integrator. `initial` is never modified.
    pub fn run_with(
        &self,
        integrator: &mut dyn Integrator,
        initial: &SystemState,
        max_time: f64,
        tick_count: usize,
    ) -> Result<RunOutput, SimError> {
        let dt = self.admit(initial, max_time, tick_count)?;
        self.execute(integrator, initial, dt, tick_count)
    }

    fn execute(
        &self,
        integrator: &mut dyn Integrator,
        initial: &SystemState,
        dt: f64,
        tick_count: usize,
    ) -> Result<RunOutput, SimError> {
        log::info!(
            "{}: {} particles, {} ticks, dt = {:.3e}",
            integrator.name(),
            initial.len(),
            tick_count,
            dt
        );

        let start = Instant::now();
        let trajectory = integrator.run(initial, dt, tick_count)?;
        let elapsed_secs = start.elapsed().as_secs_f64();

        log::info!("{}: finished in {:.3}s", integrator.name(), elapsed_secs);
        Ok(RunOutput {
            trajectory,
            elapsed_secs,
        })
    }
}
