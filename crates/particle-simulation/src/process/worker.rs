//! Worker-process side of the multiprocess backend

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::ops::Range;

use glam::DVec2;
use particle_physics::{GravityModel, ParticleRecord, PhysicsError};

use super::wire::{self, Frame, Phase, WorkerFailure};
use crate::error::SimError;
use crate::verlet;

/// Answer coordinator requests until `Shutdown` or end of input
pub fn serve<R: Read, W: Write>(mut reader: R, mut writer: W) -> Result<(), SimError> {
    let (worker, model) = match wire::read_frame(&mut reader)? {
        Frame::Configure { worker, model } => (worker, model),
        other => {
            return Err(SimError::Protocol(format!(
                "expected configure frame, got {other:?}"
            )))
        }
    };
    log::debug!("worker {worker} configured (G = {})", model.gravitational_constant);

    let mut accelerations: Vec<DVec2> = Vec::new();
    loop {
        let frame = match wire::read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) if wire::is_disconnect(&e) => {
                log::debug!("worker {worker}: coordinator closed the pipe");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match frame {
            Frame::Phase {
                phase,
                range,
                dt,
                records,
            } => {
                match run_phase(&model, phase, range.clone(), dt, &records, &mut accelerations) {
                    Ok(updated) => wire::send_partition(&mut writer, worker, range, &updated)?,
                    Err(failure) => wire::send_failure(&mut writer, worker, &failure)?,
                }
            }
            Frame::Shutdown => {
                log::debug!("worker {worker} shutting down");
                return Ok(());
            }
            other => {
                return Err(SimError::Protocol(format!(
                    "worker {worker}: unexpected frame {other:?}"
                )))
            }
        }
    }
}

fn run_phase(
    model: &GravityModel,
    phase: Phase,
    range: Range<usize>,
    dt: f64,
    records: &[ParticleRecord],
    accelerations: &mut Vec<DVec2>,
) -> Result<Vec<ParticleRecord>, WorkerFailure> {
    let result = match phase {
        Phase::Position => verlet::position_phase(model, records, range, dt, accelerations),
        Phase::Velocity => {
            if accelerations.len() != range.len() {
                return Err(WorkerFailure::Other(format!(
                    "velocity phase for {range:?} without matching position phase"
                )));
            }
            verlet::velocity_phase(model, records, range, dt, accelerations)
        }
    };
    result.map_err(|e| match e {
        PhysicsError::NonFiniteAcceleration { index } => WorkerFailure::Degenerate { index },
        other => WorkerFailure::Other(other.to_string()),
    })
}

/// [`serve`] over this process's stdin/stdout
pub fn serve_stdio() -> Result<(), SimError> {
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    serve(BufReader::new(stdin), BufWriter::new(stdout))
}
