use glam::DVec2;
use particle_physics::{GravityModel, Particle, SystemState};
use particle_simulation::{
    Backend, ExplicitBaseline, ForceConfig, Integrator, MultiprocessVerlet, SequentialVerlet,
    SimError, Simulation, SimulationConfig, SolverTolerances, ThreadedVerlet, Trajectory,
    WorkerCommand,
};

const CPU_BACKENDS: [Backend; 3] = [
    Backend::Baseline,
    Backend::VerletSequential,
    Backend::VerletThreaded,
];

fn worker_command() -> WorkerCommand {
    WorkerCommand::new(env!("CARGO_BIN_EXE_particle-worker"))
}

/// G = 1 so that small systems move visibly in a few ticks
fn test_config(workers: usize) -> SimulationConfig {
    SimulationConfig::default()
        .with_force(ForceConfig {
            gravitational_constant: 1.0,
            collision_gate: false,
        })
        .with_workers(workers)
        .with_worker_command(worker_command())
}

fn model() -> GravityModel {
    GravityModel::new(1.0)
}

/// Deterministic spread of `n` bodies on a jittered spiral
fn spiral(n: usize) -> SystemState {
    SystemState::from_particles((0..n).map(|i| {
        let t = i as f64 * 0.7;
        let r = 2.0 + i as f64 * 0.9;
        Particle::new(
            DVec2::new(r * t.cos(), r * t.sin()),
            DVec2::new(-t.sin(), t.cos()) * 0.2,
            0.5 + (i % 5) as f64 * 0.3,
        )
    }))
    .unwrap()
}

fn two_body(dist: f64) -> SystemState {
    SystemState::from_particles([
        Particle::new(DVec2::new(-dist / 2.0, 0.0), DVec2::ZERO, 1.0),
        Particle::new(DVec2::new(dist / 2.0, 0.0), DVec2::ZERO, 1.0),
    ])
    .unwrap()
}

fn assert_bit_identical(a: &Trajectory, b: &Trajectory) {
    assert_eq!(a.len(), b.len());
    for (tick, (sa, sb)) in a.iter().zip(b).enumerate() {
        assert_eq!(sa.len(), sb.len(), "tick {tick}");
        for (ra, rb) in sa.records().iter().zip(sb.records()) {
            for (x, y) in bits(ra).iter().zip(bits(rb)) {
                assert_eq!(*x, y, "tick {tick}: {ra:?} vs {rb:?}");
            }
        }
    }
}

fn bits(record: &particle_physics::ParticleRecord) -> Vec<u64> {
    record
        .position
        .iter()
        .chain(&record.velocity)
        .map(|v| v.to_bits())
        .collect()
}

// ==================================================================================
// Driver contract
// ==================================================================================

#[test]
fn driver_returns_tick_count_snapshots_starting_with_initial() {
    let initial = spiral(6);
    let before = initial.clone();

    for backend in CPU_BACKENDS {
        let sim = Simulation::new(test_config(2));
        let out = sim.run(&initial, 1.0, 10, backend).unwrap();

        assert_eq!(out.trajectory.len(), 10, "{backend}");
        assert_eq!(out.trajectory[0], initial, "{backend}");
        assert_ne!(out.trajectory[9], initial, "{backend}");
        assert!(out.elapsed_secs >= 0.0);
    }
    assert_eq!(initial, before);
}

#[test]
fn single_tick_run_is_just_the_initial_state() {
    let initial = spiral(3);
    let out = Simulation::new(test_config(2))
        .run(&initial, 5.0, 1, Backend::VerletSequential)
        .unwrap();
    assert_eq!(out.trajectory, vec![initial]);
}

#[test]
fn zero_ticks_is_rejected() {
    let err = Simulation::new(test_config(2))
        .run(&spiral(3), 1.0, 0, Backend::VerletSequential)
        .unwrap_err();
    assert!(matches!(err, SimError::InvalidTickCount(0)));
}

#[test]
fn empty_system_produces_empty_snapshots() {
    for backend in CPU_BACKENDS {
        let out = Simulation::new(test_config(2))
            .run(&SystemState::new(), 1.0, 4, backend)
            .unwrap();
        assert_eq!(out.trajectory.len(), 4);
        assert!(out.trajectory.iter().all(|s| s.is_empty()));
    }
}

// ==================================================================================
// Physics
// ==================================================================================

#[test]
fn lone_particle_moves_in_a_straight_line() {
    let initial =
        SystemState::from_particles([Particle::new(DVec2::ZERO, DVec2::new(1.0, 0.0), 1.0)])
            .unwrap();

    let mut state = initial.clone();
    let mut verlet = SequentialVerlet::new(model());
    for _ in 0..5 {
        verlet.step(&mut state, 1.0).unwrap();
    }
    assert_eq!(state.records()[0].position, [5.0, 0.0]);
    assert_eq!(state.records()[0].velocity, [1.0, 0.0]);

    // Snapshot 0 is the input, so tick_count snapshots hold tick_count - 1 steps
    for backend in CPU_BACKENDS {
        let sim = Simulation::new(test_config(3));

        let out = sim.run(&initial, 5.0, 5, backend).unwrap();
        assert_eq!(out.trajectory.len(), 5);
        let last = out.trajectory.last().unwrap();
        assert_eq!(last.records()[0].position, [4.0, 0.0], "{backend}");

        let out = sim.run(&initial, 6.0, 6, backend).unwrap();
        let last = out.trajectory.last().unwrap();
        assert_eq!(last.records()[0].position, [5.0, 0.0], "{backend}");
    }
}

#[test]
fn two_bodies_at_rest_fall_together() {
    for backend in CPU_BACKENDS {
        let out = Simulation::new(test_config(2))
            .run(&two_body(2.0), 0.5, 50, backend)
            .unwrap();

        let separation: Vec<f64> = out
            .trajectory
            .iter()
            .map(|s| (s.records()[1].position() - s.records()[0].position()).length())
            .collect();
        for pair in separation.windows(2) {
            assert!(pair[1] < pair[0], "{backend}: {pair:?}");
        }
    }
}

#[test]
fn symmetric_fall_keeps_centre_of_mass_fixed() {
    for backend in [Backend::VerletSequential, Backend::VerletThreaded] {
        let out = Simulation::new(test_config(2))
            .run(&two_body(2.0), 0.5, 50, backend)
            .unwrap();
        let last = out.trajectory.last().unwrap();
        let centre = last.records()[0].position() + last.records()[1].position();
        assert_eq!(centre, DVec2::ZERO, "{backend}");
    }
}

#[test]
fn verlet_conserves_momentum() {
    let initial = spiral(12);
    let p0 = initial.total_momentum();

    let trajectory = SequentialVerlet::new(model())
        .run(&initial, 0.01, 200)
        .unwrap();
    for state in &trajectory {
        assert!((state.total_momentum() - p0).length() < 1e-9);
    }
}

#[test]
fn baseline_and_verlet_agree_on_short_runs() {
    let initial = spiral(5);
    let mut baseline = ExplicitBaseline::new(model(), SolverTolerances::default());
    let reference = baseline.run(&initial, 0.001, 50).unwrap();
    let verlet = SequentialVerlet::new(model()).run(&initial, 0.001, 50).unwrap();

    let last_ref = reference.last().unwrap();
    let last_verlet = verlet.last().unwrap();
    for (a, b) in last_ref.records().iter().zip(last_verlet.records()) {
        assert!((a.position() - b.position()).length() < 1e-5);
    }
}

#[test]
fn expired_particles_leave_later_snapshots() {
    let initial = SystemState::from_particles([
        Particle::new(DVec2::new(-5.0, 0.0), DVec2::ZERO, 1.0).with_life_time(2),
        Particle::new(DVec2::new(5.0, 0.0), DVec2::ZERO, 1.0),
        Particle::new(DVec2::new(0.0, 5.0), DVec2::ZERO, 1.0).with_life_time(0),
    ])
    .unwrap();

    let trajectory = SequentialVerlet::new(model()).run(&initial, 0.1, 5).unwrap();
    let counts: Vec<usize> = trajectory.iter().map(|s| s.len()).collect();
    assert_eq!(counts, vec![3, 2, 2, 1, 1]);
    assert_eq!(trajectory[1].life_times(), &[Some(1), None]);
    assert_eq!(trajectory[2].life_times(), &[Some(0), None]);
    // Once alone the survivor drifts at constant velocity
    let (a, b) = (trajectory[3].records()[0], trajectory[4].records()[0]);
    assert_eq!(a.velocity, b.velocity);
    assert_eq!(b.position(), a.position() + a.velocity() * 0.1);
}

#[test]
fn coincident_particles_are_degenerate_on_every_backend() {
    let initial = SystemState::from_particles([
        Particle::new(DVec2::new(1.0, 1.0), DVec2::ZERO, 1.0),
        Particle::new(DVec2::new(1.0, 1.0), DVec2::ZERO, 1.0),
        Particle::new(DVec2::new(4.0, 0.0), DVec2::ZERO, 1.0),
    ])
    .unwrap();

    for backend in CPU_BACKENDS.into_iter().chain([Backend::VerletMultiprocess]) {
        let err = Simulation::new(test_config(2))
            .run(&initial, 1.0, 3, backend)
            .unwrap_err();
        assert!(err.is_degenerate(), "{backend}: {err}");
    }
}

// ==================================================================================
// Parallel backends
// ==================================================================================

#[test]
fn threads_match_sequential_bit_for_bit() {
    for n in [2, 3, 7, 17, 50] {
        let initial = spiral(n);
        let expected = SequentialVerlet::new(model()).run(&initial, 0.01, 100).unwrap();

        for workers in [1, 2, 4, 5] {
            let actual = ThreadedVerlet::new(model(), workers)
                .unwrap()
                .run(&initial, 0.01, 100)
                .unwrap();
            assert_bit_identical(&actual, &expected);
        }
    }
}

#[test]
fn more_threads_than_particles() {
    let initial = spiral(3);
    let expected = SequentialVerlet::new(model()).run(&initial, 0.01, 20).unwrap();
    let actual = ThreadedVerlet::new(model(), 8)
        .unwrap()
        .run(&initial, 0.01, 20)
        .unwrap();
    assert_bit_identical(&actual, &expected);
}

#[test]
fn processes_match_sequential_bit_for_bit() {
    let initial = spiral(17);
    let expected = SequentialVerlet::new(model()).run(&initial, 0.01, 30).unwrap();

    for workers in [1, 2, 4, 5] {
        let mut verlet = MultiprocessVerlet::spawn(model(), workers, &worker_command()).unwrap();
        let actual = verlet.run(&initial, 0.01, 30).unwrap();
        assert_bit_identical(&actual, &expected);
    }
}

#[test]
fn process_backend_through_the_driver() {
    let initial = spiral(9);
    let sim = Simulation::new(test_config(3));
    let expected = sim
        .run(&initial, 1.0, 25, Backend::VerletSequential)
        .unwrap();
    let actual = sim
        .run(&initial, 1.0, 25, Backend::VerletMultiprocess)
        .unwrap();
    assert_bit_identical(&actual.trajectory, &expected.trajectory);
}

#[cfg(unix)]
#[test]
fn dead_worker_process_is_reported() {
    let command = WorkerCommand::new("false");
    let result = MultiprocessVerlet::spawn(model(), 2, &command)
        .and_then(|mut verlet| verlet.run(&spiral(4), 0.01, 3));
    assert!(
        matches!(result, Err(SimError::WorkerFailed { .. })),
        "{result:?}"
    );
}

#[test]
fn runs_are_reproducible() {
    let initial = spiral(20);
    for backend in CPU_BACKENDS {
        let sim = Simulation::new(test_config(3));
        let a = sim.run(&initial, 2.0, 40, backend).unwrap();
        let b = sim.run(&initial, 2.0, 40, backend).unwrap();
        assert_bit_identical(&a.trajectory, &b.trajectory);
    }
}
