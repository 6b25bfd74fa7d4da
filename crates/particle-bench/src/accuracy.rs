//! Accuracy comparison: per-tick position divergence against a reference backend

use particle_physics::SystemState;
use particle_simulation::{time_step, Backend, Simulation, Trajectory};

use crate::error::{BackendFailure, BenchError};

/// One backend's result in an accuracy comparison
#[derive(Clone, Debug, PartialEq)]
pub struct AccuracyRun {
    pub backend: Backend,
    pub elapsed_secs: f64,
    /// Summed position distance to the reference, one entry per tick
    pub divergence: Vec<f64>,
}

impl AccuracyRun {
    pub fn mean_divergence(&self) -> f64 {
        if self.divergence.is_empty() {
            return 0.0;
        }
        self.divergence.iter().sum::<f64>() / self.divergence.len() as f64
    }

    pub fn max_divergence(&self) -> f64 {
        self.divergence.iter().copied().fold(0.0, f64::max)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccuracyReport {
    pub reference: Backend,
    pub reference_secs: f64,
    pub particle_count: usize,
    pub max_time: f64,
    pub tick_count: usize,
    pub dt: f64,
    pub runs: Vec<AccuracyRun>,
    pub failures: Vec<BackendFailure>,
}

/// Σ over particles of |x_a − x_b| for every tick. Snapshots are paired by
/// tick and particles by index; the shorter side bounds each pairing.
pub fn divergence(reference: &Trajectory, other: &Trajectory) -> Vec<f64> {
    reference
        .iter()
        .zip(other)
        .map(|(a, b)| snapshot_divergence(a, b))
        .collect()
}

fn snapshot_divergence(a: &SystemState, b: &SystemState) -> f64 {
    a.records()
        .iter()
        .zip(b.records())
        .map(|(ra, rb)| (ra.position() - rb.position()).length())
        .sum()
}

/// Run `reference` and every backend in `backends` on their own copy of
/// `initial`. A backend that fails is recorded in the report and skipped; only
/// a failing reference aborts the comparison.
pub fn compare_accuracy(
    simulation: &Simulation,
    initial: &SystemState,
    reference: Backend,
    backends: &[Backend],
    max_time: f64,
    tick_count: usize,
) -> Result<AccuracyReport, BenchError> {
    if backends.is_empty() {
        return Err(BenchError::NoBackends);
    }
    let dt = time_step(max_time, tick_count)?;

    let reference_state = initial.clone();
    let reference_run = simulation
        .run(&reference_state, max_time, tick_count, reference)
        .map_err(|source| BenchError::ReferenceFailed {
            backend: reference,
            source,
        })?;

    let mut runs = Vec::with_capacity(backends.len());
    let mut failures = Vec::new();
    for &backend in backends {
        let state = initial.clone();
        match simulation.run(&state, max_time, tick_count, backend) {
            Ok(output) => {
                let run = AccuracyRun {
                    backend,
                    elapsed_secs: output.elapsed_secs,
                    divergence: divergence(&reference_run.trajectory, &output.trajectory),
                };
                log::info!(
                    "{backend}: mean divergence {:.3e} vs {reference}",
                    run.mean_divergence()
                );
                runs.push(run);
            }
            Err(e) => {
                log::warn!("{backend} failed, continuing without it: {e}");
                failures.push(BackendFailure {
                    backend,
                    particle_count: None,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(AccuracyReport {
        reference,
        reference_secs: reference_run.elapsed_secs,
        particle_count: initial.len(),
        max_time,
        tick_count,
        dt,
        runs,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DVec2;
    use particle_physics::Particle;

    fn state(xs: &[f64]) -> SystemState {
        SystemState::from_particles(
            xs.iter()
                .map(|&x| Particle::new(DVec2::new(x, 0.0), DVec2::ZERO, 1.0)),
        )
        .unwrap()
    }

    #[test]
    fn divergence_sums_distances_per_tick() {
        let a = vec![state(&[0.0, 1.0]), state(&[0.0, 1.0])];
        let b = vec![state(&[0.0, 1.0]), state(&[0.5, 3.0])];
        let d = divergence(&a, &b);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0], 0.0);
        assert_relative_eq!(d[1], 2.5);
    }

    #[test]
    fn shorter_snapshot_bounds_the_pairing() {
        let a = vec![state(&[0.0, 1.0, 2.0])];
        let b = vec![state(&[1.0])];
        assert_eq!(divergence(&a, &b), vec![1.0]);
    }

    #[test]
    fn mean_and_max() {
        let run = AccuracyRun {
            backend: Backend::VerletSequential,
            elapsed_secs: 0.0,
            divergence: vec![0.0, 1.0, 5.0],
        };
        assert_relative_eq!(run.mean_divergence(), 2.0);
        assert_eq!(run.max_divergence(), 5.0);
    }
}
