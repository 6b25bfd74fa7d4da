//! Integrator contract and backend selection

use std::fmt;
use std::str::FromStr;

use particle_physics::SystemState;

use crate::error::SimError;
use crate::gpu::GpuVerlet;
use crate::params::SimulationConfig;
use crate::process::MultiprocessVerlet;
use crate::sequential::{ExplicitBaseline, SequentialVerlet};
use crate::threaded::ThreadedVerlet;

/// Full system state captured at one tick
pub type Snapshot = SystemState;

/// Snapshots of one run, snapshot 0 being the initial state
pub type Trajectory = Vec<Snapshot>;

/// Single-step updater
///
/// Implementors provide [`Integrator::integrate`] for systems of two or more
/// particles; [`Integrator::step`] wraps it with the bookkeeping every backend
/// shares (expiry, the force-free fast path, lifetime countdown).
pub trait Integrator {
    fn name(&self) -> &str;

    /// Advance an interacting system (at least two particles) by `dt`
    fn integrate(&mut self, state: &mut SystemState, dt: f64) -> Result<(), SimError>;

    /// One tick
    fn step(&mut self, state: &mut SystemState, dt: f64) -> Result<(), SimError> {
        let removed = state.remove_expired();
        if removed > 0 {
            log::trace!("{}: {removed} particles expired", self.name());
        }

        match state.len() {
            0 => return Ok(()),
            1 => state.drift(dt),
            _ => self.integrate(state, dt)?,
        }

        state.tick_life_times();
        Ok(())
    }

    /// `tick_count` snapshots starting with an untouched copy of `initial`
    fn run(
        &mut self,
        initial: &SystemState,
        dt: f64,
        tick_count: usize,
    ) -> Result<Trajectory, SimError> {
        let mut trajectory = Vec::with_capacity(tick_count);
        trajectory.push(initial.clone());

        let mut state = initial.clone();
        for tick in 1..tick_count {
            self.step(&mut state, dt)?;
            log::trace!("{}: tick {tick}, {} particles", self.name(), state.len());
            trajectory.push(state.clone());
        }
        Ok(trajectory)
    }
}

/// Closed set of execution strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Adaptive explicit Runge–Kutta, the accuracy reference
    Baseline,
    VerletSequential,
    VerletThreaded,
    VerletMultiprocess,
    VerletGpu,
}

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::Baseline,
        Backend::VerletSequential,
        Backend::VerletThreaded,
        Backend::VerletMultiprocess,
        Backend::VerletGpu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Baseline => "baseline",
            Backend::VerletSequential => "verlet-sequential",
            Backend::VerletThreaded => "verlet-threaded",
            Backend::VerletMultiprocess => "verlet-multiprocess",
            Backend::VerletGpu => "verlet-gpu",
        }
    }

    /// Build a fresh integrator; no state is shared between instances
    pub fn create(&self, config: &SimulationConfig) -> Result<Box<dyn Integrator>, SimError> {
        let model = config.force.model();
        Ok(match self {
            Backend::Baseline => Box::new(ExplicitBaseline::new(model, config.solver)),
            Backend::VerletSequential => Box::new(SequentialVerlet::new(model)),
            Backend::VerletThreaded => Box::new(ThreadedVerlet::new(model, config.workers)?),
            Backend::VerletMultiprocess => Box::new(MultiprocessVerlet::spawn(
                model,
                config.workers,
                &config.worker_command,
            )?),
            Backend::VerletGpu => Box::new(GpuVerlet::new(model)?),
        })
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "odeint" => return Ok(Backend::Baseline),
            "verlet" => return Ok(Backend::VerletSequential),
            _ => {}
        }
        Backend::ALL
            .into_iter()
            .find(|b| b.name() == wanted)
            .ok_or_else(|| SimError::UnknownBackend(s.to_string()))
    }
}
