//! Criterion benchmarks for the O(N²) force sweep and one Verlet tick on the
//! CPU backends.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec2;
use particle_physics::{GravityModel, Particle, SystemState};
use particle_simulation::{Integrator, SequentialVerlet, ThreadedVerlet};

fn ring(n: usize) -> SystemState {
    SystemState::from_particles((0..n).map(|i| {
        let angle = i as f64 / n as f64 * std::f64::consts::TAU;
        Particle::new(
            DVec2::new(angle.cos(), angle.sin()) * 100.0,
            DVec2::new(-angle.sin(), angle.cos()),
            1.0e3,
        )
    }))
    .expect("ring particles are valid")
}

fn bench_force_sweep(c: &mut Criterion) {
    let model = GravityModel::default();
    let mut group = c.benchmark_group("force_sweep");

    for n in [64, 256, 1024] {
        let state = ring(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &state, |b, state| {
            b.iter(|| model.accelerations(state).expect("finite accelerations"));
        });
    }

    group.finish();
}

fn bench_step(c: &mut Criterion) {
    let model = GravityModel::default();
    let mut group = c.benchmark_group("verlet_step");

    for n in [64, 256, 1024] {
        let initial = ring(n);

        group.bench_with_input(BenchmarkId::new("sequential", n), &initial, |b, initial| {
            let mut verlet = SequentialVerlet::new(model);
            let mut state = initial.clone();
            b.iter(|| verlet.step(&mut state, 1e-3).expect("step"));
        });

        group.bench_with_input(BenchmarkId::new("threaded-4", n), &initial, |b, initial| {
            let mut verlet = ThreadedVerlet::new(model, 4).expect("thread pool");
            let mut state = initial.clone();
            b.iter(|| verlet.step(&mut state, 1e-3).expect("step"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_force_sweep, bench_step);
criterion_main!(benches);
