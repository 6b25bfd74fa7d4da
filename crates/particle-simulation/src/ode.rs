//! Adaptive explicit Runge–Kutta stepping for the baseline
//!
//! Thin adapter over `ode_solvers`' Dormand–Prince 5(4): given a derivative
//! function over a 4-vector `(x, y, vx, vy)`, produce the state at `t1`.

use std::cell::Cell;

use ode_solvers::dop_shared::OutputType;
use ode_solvers::dopri5::Dopri5;
use ode_solvers::{System, Vector4};
use thiserror::Error;

use crate::params::SolverTolerances;

pub type OdeState = [f64; 4];

type State = Vector4<f64>;

// Hairer's DOPRI5 step-control defaults
const SAFETY: f64 = 0.9;
const BETA: f64 = 0.04;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const STIFFNESS_CHECKS: u32 = 1000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("derivative became non-finite at t = {t}")]
    NonFinite { t: f64 },

    #[error("integration stopped: {0}")]
    Integration(String),

    #[error("solver produced no output for [{t0}, {t1}]")]
    NoOutput { t0: f64, t1: f64 },
}

/// Right-hand side handed to the stepper. The stepper cannot be told about a
/// bad derivative, so the first non-finite evaluation is recorded on the side.
struct Derivative<'a, F> {
    rhs: F,
    non_finite: &'a Cell<Option<f64>>,
}

impl<F> System<f64, State> for Derivative<'_, F>
where
    F: Fn(f64, &OdeState) -> OdeState,
{
    fn system(&self, t: f64, y: &State, dy: &mut State) {
        let d = (self.rhs)(t, &[y[0], y[1], y[2], y[3]]);
        if self.non_finite.get().is_none() && d.iter().any(|v| !v.is_finite()) {
            self.non_finite.set(Some(t));
        }
        *dy = State::new(d[0], d[1], d[2], d[3]);
    }
}

/// Integrate `dy/dt = rhs(t, y)` from `t0` to `t1`. Without a configured
/// initial step the stepper picks its own.
pub fn integrate<F>(
    rhs: F,
    y0: OdeState,
    t0: f64,
    t1: f64,
    tol: &SolverTolerances,
) -> Result<OdeState, SolverError>
where
    F: Fn(f64, &OdeState) -> OdeState,
{
    let span = t1 - t0;
    if span <= 0.0 {
        return Ok(y0);
    }
    if rhs(t0, &y0).iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite { t: t0 });
    }

    let non_finite = Cell::new(None);
    let derivative = Derivative {
        rhs,
        non_finite: &non_finite,
    };
    let initial_step = tol.initial_step.map_or(0.0, |h| h.min(span));
    let max_steps = u32::try_from(tol.max_steps).unwrap_or(u32::MAX);

    let mut stepper = Dopri5::from_param(
        derivative,
        t0,
        t1,
        span,
        State::new(y0[0], y0[1], y0[2], y0[3]),
        tol.rtol,
        tol.atol,
        SAFETY,
        BETA,
        MIN_FACTOR,
        MAX_FACTOR,
        span,
        initial_step,
        max_steps,
        STIFFNESS_CHECKS,
        OutputType::Sparse,
    );
    let result = stepper.integrate();

    if let Some(t) = non_finite.get() {
        return Err(SolverError::NonFinite { t });
    }
    let stats = result.map_err(|e| SolverError::Integration(e.to_string()))?;
    log::trace!("dopri5 [{t0}, {t1}]: {stats}");

    let y = stepper
        .y_out()
        .last()
        .ok_or(SolverError::NoOutput { t0, t1 })?;
    if y.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite { t: t1 });
    }
    Ok([y[0], y[1], y[2], y[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn exponential_decay() {
        let tol = SolverTolerances::default();
        let y = integrate(
            |_, y| [-y[0], -2.0 * y[1], 0.0, 0.0],
            [1.0, 1.0, 3.0, 0.0],
            0.0,
            2.0,
            &tol,
        )
        .unwrap();
        assert_relative_eq!(y[0], (-2.0f64).exp(), max_relative = 1e-6);
        assert_relative_eq!(y[1], (-4.0f64).exp(), max_relative = 1e-6);
        assert_eq!(y[2], 3.0);
    }

    #[test]
    fn harmonic_oscillator_full_period() {
        let tol = SolverTolerances {
            rtol: 1e-10,
            atol: 1e-12,
            initial_step: Some(0.01),
            max_steps: 10_000,
        };
        let period = std::f64::consts::TAU;
        // x'' = -x in both axes, phase shifted
        let y = integrate(
            |_, y| [y[2], y[3], -y[0], -y[1]],
            [1.0, 0.0, 0.0, 1.0],
            0.0,
            period,
            &tol,
        )
        .unwrap();
        assert_relative_eq!(y[0], 1.0, epsilon = 1e-7);
        assert_relative_eq!(y[1], 0.0, epsilon = 1e-7);
        assert_relative_eq!(y[3], 1.0, epsilon = 1e-7);
    }

    #[test]
    fn constant_velocity_is_exact() {
        let y = integrate(
            |_, y| [y[2], y[3], 0.0, 0.0],
            [0.0, 1.0, 2.0, -1.0],
            0.0,
            0.5,
            &SolverTolerances::default(),
        )
        .unwrap();
        assert_relative_eq!(y[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(y[1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_derivative_is_reported() {
        let err = integrate(
            |_, _| [f64::NAN; 4],
            [0.0; 4],
            0.0,
            1.0,
            &SolverTolerances::default(),
        )
        .unwrap_err();
        assert_eq!(err, SolverError::NonFinite { t: 0.0 });
    }

    #[test]
    fn derivative_blowing_up_mid_interval_is_reported() {
        let err = integrate(
            |t, _| if t > 0.5 { [f64::INFINITY; 4] } else { [1.0; 4] },
            [0.0; 4],
            0.0,
            1.0,
            &SolverTolerances::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::NonFinite { t } if t > 0.5));
    }

    #[test]
    fn empty_interval_returns_input() {
        let y0 = [1.0, 2.0, 3.0, 4.0];
        let y = integrate(|_, _| [1.0; 4], y0, 1.0, 1.0, &SolverTolerances::default()).unwrap();
        assert_eq!(y, y0);
    }
}
