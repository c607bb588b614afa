//! Numeric constants for the grid N-body simulation.
//!
//! Values are scaled for real-time visualization inside a unit-ish world box,
//! not for astronomical accuracy.

/// Default gravitational constant in simulation units.
pub const DEFAULT_GRAVITY: f32 = 1.0e-4;

/// Softening added to squared distance in the force law, bounding acceleration
/// when a particle sits on (or near) a cell's center of mass.
pub const SOFTENING: f32 = 1.0e-4;

/// A cell whose accumulated mass is at or below this contributes no force.
pub const MASS_EPSILON: f32 = 1.0e-6;

/// Smallest timestep ever fed to the integrator (seconds).
pub const MIN_TIMESTEP: f32 = 1.0e-7;

/// Largest timestep ever fed to the integrator (seconds). Larger frame deltas
/// are clamped down to keep per-step displacement bounded.
pub const MAX_TIMESTEP: f32 = 1.0e-3;

/// Mass of every seeded particle.
pub const PARTICLE_MASS: f32 = 1.0;

/// Tangential speed for the counter-rotating seed velocities.
pub const ORBIT_SPEED: f32 = 1.7;

/// Radius of the ring distribution.
pub const RING_RADIUS: f32 = 0.25;

/// Standard deviation of the gaussian blob distribution.
pub const BLOB_SIGMA: f32 = 0.35;

/// Outer radius reached by the spiral distribution at t = 1.
pub const SPIRAL_RADIUS: f32 = 0.9;

/// Per-coordinate gaussian jitter applied to spiral samples.
pub const SPIRAL_JITTER: f32 = 0.02;

/// Amplitude of the spiral's out-of-plane wave (decays toward the rim).
pub const SPIRAL_WAVE: f32 = 0.1;
