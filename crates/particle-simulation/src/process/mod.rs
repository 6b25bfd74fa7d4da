//! Multiprocess velocity-Verlet
//!
//! The coordinator owns the authoritative state and is the only process that
//! merges worker results. One tick is two request/gather rounds over the
//! worker pipes:
//!
//! 1. broadcast the pre-step snapshot, each worker returns its range with
//!    updated positions;
//! 2. broadcast the merged snapshot, each worker returns its range with
//!    updated velocities.
//!
//! Gathering every reply before merging is the rendezvous between phases.

pub mod wire;
pub mod worker;

use std::io::{BufReader, BufWriter};
use std::ops::Range;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use particle_physics::{GravityModel, PhysicsError, SystemState};

use crate::error::SimError;
use crate::integrator::Integrator;
use crate::params::WorkerCommand;
use crate::partition::partition;
use wire::{Frame, Phase, WorkerFailure};

pub use worker::{serve, serve_stdio};

struct WorkerProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    fn spawn(worker: usize, command: &WorkerCommand) -> Result<Self, SimError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SimError::WorkerSpawn { worker, source })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SimError::WorkerFailed {
                worker,
                reason: "worker pipes were not created".to_string(),
            });
        };

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }
}

/// Velocity-Verlet split over a pool of worker processes
pub struct MultiprocessVerlet {
    workers: Vec<WorkerProcess>,
    poisoned: bool,
}

impl MultiprocessVerlet {
    /// Launch `workers` copies of `command` and configure them with `model`
    pub fn spawn(
        model: GravityModel,
        workers: usize,
        command: &WorkerCommand,
    ) -> Result<Self, SimError> {
        if workers == 0 {
            return Err(SimError::NoWorkers);
        }

        // Already-started children are shut down by Drop if a later one fails
        let mut pool = Self {
            workers: Vec::with_capacity(workers),
            poisoned: false,
        };
        for worker in 0..workers {
            let mut process = WorkerProcess::spawn(worker, command)?;
            let configured = wire::send_configure(&mut process.stdin, worker, &model);
            pool.workers.push(process);
            if let Err(e) = configured {
                pool.poisoned = true;
                return Err(SimError::WorkerFailed {
                    worker,
                    reason: e.to_string(),
                });
            }
        }

        log::debug!(
            "started {workers} verlet worker processes ({})",
            command.program.display()
        );
        Ok(pool)
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Run one phase on every worker and merge the returned ranges into `state`
    fn phase(
        &mut self,
        phase: Phase,
        state: &mut SystemState,
        ranges: &[Range<usize>],
        dt: f64,
    ) -> Result<(), SimError> {
        let mut first_error: Option<SimError> = None;
        let mut pending = Vec::with_capacity(ranges.len());

        for (worker, (process, range)) in self.workers.iter_mut().zip(ranges).enumerate() {
            match wire::send_phase(&mut process.stdin, phase, range.clone(), dt, state.records()) {
                Ok(()) => pending.push(worker),
                Err(e) => {
                    self.poisoned = true;
                    first_error.get_or_insert(SimError::WorkerFailed {
                        worker,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Drain every reply, even after a failure, so the pipes stay in step
        let mut replies = Vec::with_capacity(pending.len());
        for worker in pending {
            let expected = &ranges[worker];
            match wire::read_frame(&mut self.workers[worker].stdout) {
                Ok(Frame::Partition { range, records, .. }) if range == *expected => {
                    replies.push((range, records));
                }
                Ok(Frame::Failure { failure, .. }) => {
                    first_error.get_or_insert(match failure {
                        WorkerFailure::Degenerate { index } => {
                            SimError::Physics(PhysicsError::NonFiniteAcceleration { index })
                        }
                        WorkerFailure::Other(reason) => SimError::WorkerFailed { worker, reason },
                    });
                }
                Ok(other) => {
                    self.poisoned = true;
                    first_error.get_or_insert(SimError::Protocol(format!(
                        "worker {worker} answered {other:?} for range {expected:?}"
                    )));
                }
                Err(e) => {
                    self.poisoned = true;
                    let reason = if wire::is_disconnect(&e) {
                        "worker process exited".to_string()
                    } else {
                        e.to_string()
                    };
                    first_error.get_or_insert(SimError::WorkerFailed { worker, reason });
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        let records = state.records_mut();
        for (range, updated) in replies {
            records[range].copy_from_slice(&updated);
        }
        Ok(())
    }
}

impl Integrator for MultiprocessVerlet {
    fn name(&self) -> &str {
        "verlet-multiprocess"
    }

    fn integrate(&mut self, state: &mut SystemState, dt: f64) -> Result<(), SimError> {
        if self.poisoned {
            return Err(SimError::WorkerFailed {
                worker: 0,
                reason: "worker pool is no longer usable".to_string(),
            });
        }

        let ranges = partition(state.len(), self.workers());
        self.phase(Phase::Position, state, &ranges, dt)?;
        self.phase(Phase::Velocity, state, &ranges, dt)
    }
}

impl Drop for MultiprocessVerlet {
    fn drop(&mut self) {
        for (worker, mut process) in self.workers.drain(..).enumerate() {
            if !self.poisoned && wire::send_shutdown(&mut process.stdin).is_ok() {
                drop(process.stdin);
            } else {
                let _ = process.child.kill();
            }
            if let Err(e) = process.child.wait() {
                log::warn!("worker process {worker} could not be reaped: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected() {
        let result = MultiprocessVerlet::spawn(
            GravityModel::default(),
            0,
            &WorkerCommand::new("particle-worker"),
        );
        assert!(matches!(result, Err(SimError::NoWorkers)));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = MultiprocessVerlet::spawn(
            GravityModel::default(),
            2,
            &WorkerCommand::new("/nonexistent/particle-worker"),
        );
        assert!(matches!(
            result,
            Err(SimError::WorkerSpawn { worker: 0, .. })
        ));
    }
}
