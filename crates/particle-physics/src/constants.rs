//! Physical and layout constants for the gravity simulation

/// Gravitational constant (m³ kg⁻¹ s⁻²)
pub const G: f64 = 6.6743015e-11;

/// Interaction radius per unit mass. Derived radii are `RADIUS_PER_MASS * mass`
pub const RADIUS_PER_MASS: f64 = 5.0;

/// Number of `f64` fields in one flat particle record: x, y, vx, vy, radius, mass
pub const RECORD_STRIDE: usize = 6;
