//! Runtime comparison: mean wall time per backend and particle count, with
//! speedups relative to the first backend

use particle_simulation::{time_step, Backend, Simulation};

use crate::emitter::random_system;
use crate::error::{BackendFailure, BenchError};

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeRequest {
    /// The first entry is the speedup baseline
    pub backends: Vec<Backend>,
    pub particle_counts: Vec<usize>,
    pub max_time: f64,
    pub tick_count: usize,
    pub iterations: usize,
    /// Seed for the random systems, one system per particle count
    pub seed: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeReport {
    pub backends: Vec<Backend>,
    pub particle_counts: Vec<usize>,
    pub max_time: f64,
    pub tick_count: usize,
    pub iterations: usize,
    /// `mean_secs[backend][count]`, `None` where the backend failed
    pub mean_secs: Vec<Vec<Option<f64>>>,
    pub failures: Vec<BackendFailure>,
}

impl RuntimeReport {
    pub fn baseline(&self) -> Backend {
        self.backends[0]
    }

    /// baseline mean / backend mean
    pub fn speedup(&self, backend: usize, count: usize) -> Option<f64> {
        let baseline = self.mean_secs[0][count]?;
        let mean = self.mean_secs[backend][count]?;
        Some(baseline / mean)
    }

    /// Same shape as `mean_secs`
    pub fn speedups(&self) -> Vec<Vec<Option<f64>>> {
        (0..self.backends.len())
            .map(|b| {
                (0..self.particle_counts.len())
                    .map(|c| self.speedup(b, c))
                    .collect()
            })
            .collect()
    }
}

/// Time every backend on the same random systems. Each iteration builds a
/// fresh backend and runs it on its own copy of the system; only integration
/// time is counted. A failing backend gets `None` for that particle count and
/// the sweep continues.
pub fn compare_runtime(
    simulation: &Simulation,
    request: &RuntimeRequest,
) -> Result<RuntimeReport, BenchError> {
    if request.backends.is_empty() {
        return Err(BenchError::NoBackends);
    }
    if request.particle_counts.is_empty() {
        return Err(BenchError::NoParticleCounts);
    }
    if request.iterations == 0 {
        return Err(BenchError::NoIterations);
    }
    time_step(request.max_time, request.tick_count)?;

    // Unbounded lifetimes keep the work per tick constant across the run
    let systems = request
        .particle_counts
        .iter()
        .map(|&count| random_system(count, request.seed, false))
        .collect::<Result<Vec<_>, _>>()?;

    let mut mean_secs = vec![vec![None; systems.len()]; request.backends.len()];
    let mut failures = Vec::new();

    for (b, &backend) in request.backends.iter().enumerate() {
        for (c, system) in systems.iter().enumerate() {
            let mut total = 0.0;
            let mut failed = None;
            for _ in 0..request.iterations {
                let state = system.clone();
                match simulation.run(&state, request.max_time, request.tick_count, backend) {
                    Ok(output) => total += output.elapsed_secs,
                    Err(e) => {
                        failed = Some(e);
                        break;
                    }
                }
            }

            match failed {
                None => {
                    let mean = total / request.iterations as f64;
                    log::info!("{backend}: {} particles, mean {mean:.4}s", system.len());
                    mean_secs[b][c] = Some(mean);
                }
                Some(e) => {
                    log::warn!(
                        "{backend} failed at {} particles, continuing: {e}",
                        system.len()
                    );
                    failures.push(BackendFailure {
                        backend,
                        particle_count: Some(system.len()),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    Ok(RuntimeReport {
        backends: request.backends.clone(),
        particle_counts: request.particle_counts.clone(),
        max_time: request.max_time,
        tick_count: request.tick_count,
        iterations: request.iterations,
        mean_secs,
        failures,
    })
}
