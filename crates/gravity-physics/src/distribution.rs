//! Initial particle distributions and seed velocities.
//!
//! All sampling composes `rand`'s uniform source with hand-rolled transforms
//! (trig placement, Box-Muller for gaussians) so a seeded RNG reproduces a
//! layout exactly.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::Rng;

use crate::constants::{
    BLOB_SIGMA, ORBIT_SPEED, PARTICLE_MASS, RING_RADIUS, SPIRAL_JITTER, SPIRAL_RADIUS, SPIRAL_WAVE,
};
use crate::particle::ParticleSet;

/// Fixed triangle for the triangle distribution.
const TRIANGLE: [Vec3; 3] = [
    Vec3::new(-0.6, -0.5, 0.0),
    Vec3::new(0.6, -0.5, 0.0),
    Vec3::new(0.0, 0.6, 0.0),
];

/// Initial position layout selected at reset time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// Each coordinate drawn uniformly across the world box.
    Uniform,
    /// Planar circle of fixed radius, angle evenly spaced by index.
    Ring,
    /// Uniform samples inside a fixed triangle (reflected barycentric).
    Triangle,
    /// Zero-mean normal per coordinate with fixed standard deviation.
    GaussianBlob,
    /// Spiral arms with per-sample jitter and a decaying out-of-plane wave.
    Spiral { arms: u32 },
}

impl Distribution {
    /// Sample `count` positions inside (or around) the world box.
    pub fn sample_positions<R: Rng>(
        &self,
        count: u32,
        world_min: Vec3,
        world_max: Vec3,
        rng: &mut R,
    ) -> Vec<Vec3> {
        let n = count as usize;
        let mut positions = Vec::with_capacity(n);
        match *self {
            Distribution::Uniform => {
                for _ in 0..n {
                    positions.push(Vec3::new(
                        rng.random_range(world_min.x..world_max.x),
                        rng.random_range(world_min.y..world_max.y),
                        rng.random_range(world_min.z..world_max.z),
                    ));
                }
            }
            Distribution::Ring => {
                for i in 0..n {
                    let angle = i as f32 / count as f32 * TAU;
                    positions.push(Vec3::new(
                        RING_RADIUS * angle.sin(),
                        RING_RADIUS * angle.cos(),
                        0.0,
                    ));
                }
            }
            Distribution::Triangle => {
                for _ in 0..n {
                    let mut u = rng.random::<f32>();
                    let mut v = rng.random::<f32>();
                    // Reflect samples outside the unit simplex back in; keeps
                    // the density uniform without rejection.
                    if u + v > 1.0 {
                        u = 1.0 - u;
                        v = 1.0 - v;
                    }
                    positions
                        .push(TRIANGLE[0] + u * (TRIANGLE[1] - TRIANGLE[0]) + v * (TRIANGLE[2] - TRIANGLE[0]));
                }
            }
            Distribution::GaussianBlob => {
                for _ in 0..n {
                    let (x, y) = gaussian_pair(rng);
                    let (z, _) = gaussian_pair(rng);
                    positions.push(Vec3::new(x, y, z) * BLOB_SIGMA);
                }
            }
            Distribution::Spiral { arms } => {
                let arms = arms.max(1) as f32;
                for i in 0..n {
                    let t = i as f32 / count as f32;
                    let angle = t * arms * 3.0 * TAU;
                    let radius = SPIRAL_RADIUS * t;
                    let (jx, jy) = gaussian_pair(rng);
                    let (jz, _) = gaussian_pair(rng);
                    let wave = (angle * 2.0).sin() * SPIRAL_WAVE * (1.0 - t);
                    positions.push(Vec3::new(
                        radius * angle.cos() + jx * SPIRAL_JITTER,
                        radius * angle.sin() + jy * SPIRAL_JITTER,
                        wave + jz * SPIRAL_JITTER,
                    ));
                }
            }
        }
        positions
    }
}

/// Counter-rotating tangential seed velocities: the angle follows the particle
/// index around the circle, the direction flips every other particle. Meant to
/// look orbital, not derived from the position layout.
pub fn orbital_velocities(count: u32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * TAU;
            let direction = if i % 2 == 0 { 1.0 } else { -1.0 };
            direction * ORBIT_SPEED * Vec3::new(-angle.sin(), angle.cos(), 0.0)
        })
        .collect()
}

/// Build a full particle set for a reset: sampled positions, optional orbital
/// velocities, unit masses.
pub fn seed_particles<R: Rng>(
    count: u32,
    distribution: Distribution,
    world_min: Vec3,
    world_max: Vec3,
    orbital: bool,
    rng: &mut R,
) -> ParticleSet {
    let positions = distribution.sample_positions(count, world_min, world_max, rng);
    let velocities = if orbital {
        orbital_velocities(count)
    } else {
        vec![Vec3::ZERO; count as usize]
    };

    let mut particles = ParticleSet::with_capacity(count as usize);
    for (p, v) in positions.into_iter().zip(velocities) {
        particles.push(p, v, PARTICLE_MASS);
    }
    particles
}

/// One pair of independent standard-normal samples (Box-Muller).
fn gaussian_pair<R: Rng>(rng: &mut R) -> (f32, f32) {
    // Guard the log: random::<f32>() can return exactly 0.
    let u1: f32 = rng.random::<f32>().max(f32::MIN_POSITIVE);
    let u2: f32 = rng.random();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = TAU * u2;
    (r * theta.cos(), r * theta.sin())
}
