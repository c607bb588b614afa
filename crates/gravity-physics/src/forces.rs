//! Softened center-of-mass gravity and the per-particle integration step.
//!
//! NOTE: These mirror the WGSL kernels term for term; the GPU path is the
//! production one, these feed the tests and the parity checks.

use glam::Vec3;

use crate::constants::MASS_EPSILON;
use crate::grid::CellAggregates;

/// Acceleration at `p` from every non-empty cell, each treated as a point
/// mass at its center of mass:
/// `a += G * m * (com - p) / (|com - p|^2 + softening)^(3/2)`.
pub fn acceleration_from_cells(
    p: Vec3,
    aggregates: &CellAggregates,
    gravity_constant: f32,
    softening: f32,
) -> Vec3 {
    let mut accel = Vec3::ZERO;
    for cell in 0..aggregates.mass.len() {
        let m = aggregates.mass[cell];
        if m <= MASS_EPSILON {
            continue;
        }
        let com = aggregates.weighted[cell] / m;
        let d = com - p;
        let dist_sq = d.length_squared() + softening;
        let inv = 1.0 / dist_sq.sqrt();
        accel += gravity_constant * m * d * (inv * inv * inv);
    }
    accel
}

/// Semi-implicit Euler: velocity first, then position with the new velocity.
#[inline]
pub fn semi_implicit_euler(p: Vec3, v: Vec3, accel: Vec3, dt: f32) -> (Vec3, Vec3) {
    let v = v + accel * dt;
    (p + v * dt, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_aggregates_exert_no_force() {
        let agg = CellAggregates::new(64);
        let a = acceleration_from_cells(Vec3::new(0.5, 0.0, 0.0), &agg, 1.0, 1e-4);
        assert_eq!(a, Vec3::ZERO);
    }

    #[test]
    fn force_points_toward_the_mass() {
        let mut agg = CellAggregates::new(1);
        agg.accumulate(0, 10.0, Vec3::new(1.0, 0.0, 0.0));
        let a = acceleration_from_cells(Vec3::ZERO, &agg, 1.0, 1e-4);
        assert!(a.x > 0.0);
        assert_eq!(a.y, 0.0);
        assert_eq!(a.z, 0.0);
    }

    #[test]
    fn softening_bounds_coincident_acceleration() {
        let mut agg = CellAggregates::new(1);
        agg.accumulate(0, 1.0, Vec3::ZERO);
        // Particle exactly on the COM: the softened law must stay finite.
        let a = acceleration_from_cells(Vec3::ZERO, &agg, 1.0, 1e-4);
        assert!(a.is_finite());
        assert_eq!(a, Vec3::ZERO); // d = 0 kills the direction term entirely
    }

    #[test]
    fn zero_gravity_integration_is_pure_drift() {
        let p = Vec3::new(0.1, -0.2, 0.3);
        let v = Vec3::new(1.0, 2.0, -3.0);
        let dt = 0.01;
        let (p2, v2) = semi_implicit_euler(p, v, Vec3::ZERO, dt);
        assert_eq!(v2, v);
        assert_eq!(p2, p + v * dt);
    }
}
