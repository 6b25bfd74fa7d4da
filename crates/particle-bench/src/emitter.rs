//! Particle emitter
//!
//! Produces initial conditions for benchmark runs. Random systems use a
//! seeded `StdRng`, so every backend and every repetition can be fed the same
//! particles.

use glam::DVec2;
use particle_physics::{Particle, PhysicsError, SystemState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Half-width of the square random positions are drawn from
pub const SPAWN_EXTENT: f64 = 100.0;
/// Half-width of the random direction components
pub const DIRECTION_EXTENT: f64 = 3.0;
/// Half-width of the random speed components
pub const SPEED_EXTENT: f64 = 100.0;
pub const MASS_RANGE: std::ops::Range<f64> = 1.0e3..1.0e5;
pub const LIFE_TIME_RANGE: std::ops::Range<u32> = 10..50;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emitter {
    pub position: DVec2,
    /// Per-axis factor applied to the emission speed
    pub direction: DVec2,
    /// Draw a random lifetime for generated particles; otherwise they never expire
    pub bounded_life_times: bool,
}

impl Default for Emitter {
    fn default() -> Self {
        Self {
            position: DVec2::ONE,
            direction: DVec2::ONE,
            bounded_life_times: true,
        }
    }
}

impl Emitter {
    pub fn new(position: DVec2, direction: DVec2) -> Self {
        Self {
            position,
            direction,
            ..Self::default()
        }
    }

    pub fn with_bounded_life_times(mut self, bounded: bool) -> Self {
        self.bounded_life_times = bounded;
        self
    }

    /// One particle at the emitter position, velocity = speed ⊙ direction
    pub fn emit(&self, speed: DVec2, mass: f64, life_time: Option<u32>) -> Particle {
        let mut particle = Particle::new(self.position, speed * self.direction, mass);
        particle.life_time = life_time;
        particle
    }

    /// `count` random particles. The emitter's own position and direction are
    /// left untouched.
    pub fn generate<R: Rng>(&self, count: usize, rng: &mut R) -> Vec<Particle> {
        (0..count)
            .map(|_| {
                let position = DVec2::new(
                    rng.random_range(-SPAWN_EXTENT..SPAWN_EXTENT),
                    rng.random_range(-SPAWN_EXTENT..SPAWN_EXTENT),
                );
                let direction = DVec2::new(
                    rng.random_range(-DIRECTION_EXTENT..DIRECTION_EXTENT),
                    rng.random_range(-DIRECTION_EXTENT..DIRECTION_EXTENT),
                );
                let speed = DVec2::new(
                    rng.random_range(-SPEED_EXTENT..SPEED_EXTENT),
                    rng.random_range(-SPEED_EXTENT..SPEED_EXTENT),
                );
                let mass = rng.random_range(MASS_RANGE);
                let life_time = self
                    .bounded_life_times
                    .then(|| rng.random_range(LIFE_TIME_RANGE));

                Emitter { position, direction, ..*self }.emit(speed, mass, life_time)
            })
            .collect()
    }
}

/// Reproducible random system of `count` particles
pub fn random_system(
    count: usize,
    seed: u64,
    bounded_life_times: bool,
) -> Result<SystemState, PhysicsError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let emitter = Emitter::default().with_bounded_life_times(bounded_life_times);
    SystemState::from_particles(emitter.generate(count, &mut rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use particle_physics::RADIUS_PER_MASS;

    #[test]
    fn emit_scales_speed_by_direction() {
        let emitter = Emitter::new(DVec2::new(3.0, 4.0), DVec2::new(2.0, -1.0));
        let p = emitter.emit(DVec2::new(1.5, 2.0), 10.0, Some(7));
        assert_eq!(p.position, DVec2::new(3.0, 4.0));
        assert_eq!(p.velocity, DVec2::new(3.0, -2.0));
        assert_eq!(p.radius, RADIUS_PER_MASS * 10.0);
        assert_eq!(p.life_time, Some(7));
    }

    #[test]
    fn generated_particles_respect_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let particles = Emitter::default().generate(200, &mut rng);
        assert_eq!(particles.len(), 200);
        for p in &particles {
            assert!(p.position.abs().max_element() <= SPAWN_EXTENT);
            assert!(MASS_RANGE.contains(&p.mass));
            assert!(LIFE_TIME_RANGE.contains(&p.life_time.unwrap()));
            assert!(p.velocity.abs().max_element() <= SPEED_EXTENT * DIRECTION_EXTENT);
        }
    }

    #[test]
    fn same_seed_same_system() {
        let a = random_system(25, 42, true).unwrap();
        let b = random_system(25, 42, true).unwrap();
        let c = random_system(25, 43, true).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn unbounded_systems_never_expire() {
        let system = random_system(10, 1, false).unwrap();
        assert!(system.life_times().iter().all(Option::is_none));
    }
}
