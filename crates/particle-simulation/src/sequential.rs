//! Single-threaded reference integrators

use glam::DVec2;
use particle_physics::{GravityModel, ParticleView, PhysicsError, SystemState};

use crate::error::SimError;
use crate::integrator::Integrator;
use crate::ode::{self, SolverError};
use crate::params::SolverTolerances;
use crate::verlet;

/// Explicit baseline: each particle's `(x, y, vx, vy)` is handed to the
/// adaptive solver in index order, with every other particle held at its
/// current value. Particles already advanced this tick are seen at their new
/// positions by the ones after them.
#[derive(Clone, Debug)]
pub struct ExplicitBaseline {
    model: GravityModel,
    tolerances: SolverTolerances,
}

impl ExplicitBaseline {
    pub fn new(model: GravityModel, tolerances: SolverTolerances) -> Self {
        Self { model, tolerances }
    }
}

impl Integrator for ExplicitBaseline {
    fn name(&self) -> &str {
        "baseline"
    }

    fn integrate(&mut self, state: &mut SystemState, dt: f64) -> Result<(), SimError> {
        for i in 0..state.len() {
            let record = state.record(i);
            let y0 = [
                record.position[0],
                record.position[1],
                record.velocity[0],
                record.velocity[1],
            ];

            let model = &self.model;
            let view: &SystemState = state;
            let rhs = |_t: f64, y: &ode::OdeState| {
                let a = model.acceleration_at(view, i, DVec2::new(y[0], y[1]));
                [y[2], y[3], a.x, a.y]
            };

            let y = ode::integrate(rhs, y0, 0.0, dt, &self.tolerances).map_err(|e| match e {
                SolverError::NonFinite { .. } => {
                    SimError::Physics(PhysicsError::NonFiniteAcceleration { index: i })
                }
                source => SimError::Solver { index: i, source },
            })?;

            let record = &mut state.records_mut()[i];
            record.position = [y[0], y[1]];
            record.velocity = [y[2], y[3]];
        }
        Ok(())
    }
}

/// Symplectic velocity-Verlet over the whole system in one thread
#[derive(Clone, Debug)]
pub struct SequentialVerlet {
    model: GravityModel,
    accelerations: Vec<DVec2>,
}

impl SequentialVerlet {
    pub fn new(model: GravityModel) -> Self {
        Self {
            model,
            accelerations: Vec::new(),
        }
    }
}

impl Integrator for SequentialVerlet {
    fn name(&self) -> &str {
        "verlet-sequential"
    }

    fn integrate(&mut self, state: &mut SystemState, dt: f64) -> Result<(), SimError> {
        let n = state.len();
        let previous = state.records().to_vec();

        let positions =
            verlet::position_phase(&self.model, &previous[..], 0..n, dt, &mut self.accelerations)?;
        state.records_mut().copy_from_slice(&positions);

        let velocities =
            verlet::velocity_phase(&self.model, state.records(), 0..n, dt, &self.accelerations)?;
        state.records_mut().copy_from_slice(&velocities);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use particle_physics::Particle;

    fn pair() -> SystemState {
        SystemState::from_particles([
            Particle::new(DVec2::new(-1.0, 0.0), DVec2::new(0.0, -0.5), 1.0),
            Particle::new(DVec2::new(1.0, 0.0), DVec2::new(0.0, 0.5), 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn verlet_matches_hand_computed_step() {
        let mut state = pair();
        let mut verlet = SequentialVerlet::new(GravityModel::new(1.0));
        verlet.integrate(&mut state, 0.1).unwrap();

        // a(t) on body 0 = 1 / 2² toward +x
        let x0 = -1.0 + 0.5 * 0.25 * 0.01;
        assert_relative_eq!(state.records()[0].position[0], x0, epsilon = 1e-15);
        assert_relative_eq!(state.records()[0].position[1], -0.05, epsilon = 1e-15);

        let sep = DVec2::new(2.0 * -x0, 0.1);
        let a1 = sep * (1.0 / sep.length().powi(3));
        let vx = 0.5 * (0.25 + a1.x) * 0.1;
        assert_relative_eq!(state.records()[0].velocity[0], vx, epsilon = 1e-15);
    }

    #[test]
    fn baseline_tracks_verlet_for_small_steps() {
        let model = GravityModel::new(1.0);
        let mut a = pair();
        let mut b = pair();
        let mut baseline = ExplicitBaseline::new(model, SolverTolerances::default());
        let mut verlet = SequentialVerlet::new(model);
        for _ in 0..20 {
            baseline.step(&mut a, 0.01).unwrap();
            verlet.step(&mut b, 0.01).unwrap();
        }
        for (p, q) in a.records().iter().zip(b.records()) {
            assert!((p.position() - q.position()).length() < 1e-4);
        }
    }

    #[test]
    fn coincident_particles_fail_instead_of_nan() {
        let mut state = SystemState::from_particles([
            Particle::new(DVec2::ZERO, DVec2::ZERO, 1.0),
            Particle::new(DVec2::ZERO, DVec2::ZERO, 1.0),
        ])
        .unwrap();

        let err = SequentialVerlet::new(GravityModel::new(1.0))
            .step(&mut state, 0.1)
            .unwrap_err();
        assert!(err.is_degenerate());

        let err = ExplicitBaseline::new(GravityModel::new(1.0), SolverTolerances::default())
            .step(&mut state, 0.1)
            .unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn empty_system_is_a_no_op() {
        let mut state = SystemState::new();
        SequentialVerlet::new(GravityModel::default())
            .step(&mut state, 1.0)
            .unwrap();
        assert!(state.is_empty());
    }
}
