//! # Gravity grid core
//!
//! CPU-side core of the grid-aggregated gravitational N-body simulation:
//! particle storage, the uniform grid, initial distributions, configuration,
//! and a reference implementation of the three per-frame phases
//! (bin -> reduce -> integrate) that mirrors the GPU kernels.

pub mod config;
pub mod constants;
pub mod distribution;
pub mod forces;
pub mod grid;
pub mod particle;

pub use config::{ConfigError, SimulationConfig};
pub use distribution::{seed_particles, Distribution};
pub use grid::{CellAggregates, GridSpec};
pub use particle::ParticleSet;

use glam::Vec3;

/// Reference implementation of the per-frame update.
///
/// Runs the same three phases as the GPU pipeline, in the same order, on the
/// host: bin every particle into a cell, reduce cells to mass + center of
/// mass, then integrate each particle against the aggregated cells.
pub struct CpuSimulation {
    particles: ParticleSet,
    grid: GridSpec,
    cell_ids: Vec<u32>,
    aggregates: CellAggregates,
    pub gravity_constant: f32,
    pub softening: f32,
}

impl CpuSimulation {
    pub fn new(particles: ParticleSet, grid: GridSpec, gravity_constant: f32, softening: f32) -> Self {
        let n = particles.len();
        let total_cells = grid.total_cells();
        Self {
            particles,
            grid,
            cell_ids: vec![0; n],
            aggregates: CellAggregates::new(total_cells),
            gravity_constant,
            softening,
        }
    }

    /// Phases 1 + 2: recompute the particle->cell map and the per-cell
    /// aggregates from current positions.
    pub fn rebuild_aggregates(&mut self) {
        let n = self.particles.len();
        self.cell_ids.resize(n, 0);
        self.aggregates.clear();
        for i in 0..n {
            let p = self.particles.position(i);
            let cell = self.grid.cell_index(p);
            self.cell_ids[i] = cell;
            self.aggregates.accumulate(cell, self.particles.masses[i], p);
        }
    }

    /// One full step: bin, reduce, then integrate every particle by `dt`.
    pub fn step(&mut self, dt: f32) {
        self.rebuild_aggregates();
        for i in 0..self.particles.len() {
            let p = self.particles.position(i);
            let v = self.particles.velocity(i);
            let accel =
                forces::acceleration_from_cells(p, &self.aggregates, self.gravity_constant, self.softening);
            let (p, v) = forces::semi_implicit_euler(p, v, accel, dt);
            self.particles.set_position(i, p);
            self.particles.set_velocity(i, v);
        }
    }

    pub fn particles(&self) -> &ParticleSet {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut ParticleSet {
        &mut self.particles
    }

    pub fn aggregates(&self) -> &CellAggregates {
        &self.aggregates
    }

    pub fn cell_ids(&self) -> &[u32] {
        &self.cell_ids
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Total momentum of the current state.
    pub fn momentum(&self) -> Vec3 {
        self.particles.momentum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_world() -> GridSpec {
        GridSpec::new([8, 8, 8], Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    fn uniform_sim(n: u32, gravity: f32) -> CpuSimulation {
        let grid = small_world();
        let mut rng = StdRng::seed_from_u64(1234);
        let particles = seed_particles(
            n,
            Distribution::Uniform,
            grid.world_min,
            grid.world_max,
            false,
            &mut rng,
        );
        CpuSimulation::new(particles, grid, gravity, constants::SOFTENING)
    }

    #[test]
    fn binning_conserves_mass() {
        let mut sim = uniform_sim(500, constants::DEFAULT_GRAVITY);
        sim.rebuild_aggregates();
        let particle_mass = sim.particles().total_mass();
        let cell_mass = sim.aggregates().total_mass();
        assert!(
            (particle_mass - cell_mass).abs() < particle_mass * 1e-5,
            "cells hold {cell_mass}, particles hold {particle_mass}"
        );
    }

    #[test]
    fn binning_conserves_mass_with_out_of_range_particles() {
        let mut sim = uniform_sim(50, constants::DEFAULT_GRAVITY);
        // Push a few particles outside the box; the clamp must keep them.
        sim.particles_mut().set_position(0, Vec3::splat(9.0));
        sim.particles_mut().set_position(1, Vec3::splat(-9.0));
        sim.rebuild_aggregates();
        let particle_mass = sim.particles().total_mass();
        let cell_mass = sim.aggregates().total_mass();
        assert!((particle_mass - cell_mass).abs() < 1e-3);
    }

    #[test]
    fn zero_gravity_update_is_exact_drift() {
        let grid = small_world();
        let mut particles = ParticleSet::default();
        particles.push(Vec3::new(0.1, 0.2, 0.3), Vec3::new(1.0, -2.0, 0.5), 1.0);
        particles.push(Vec3::new(-0.4, 0.0, 0.9), Vec3::new(0.0, 0.0, -1.0), 2.0);
        particles.push(Vec3::new(0.7, -0.7, 0.0), Vec3::new(-0.3, 0.3, 0.0), 0.5);
        particles.push(Vec3::new(0.0, 0.5, -0.5), Vec3::new(2.0, 2.0, 2.0), 1.5);
        let expected: Vec<Vec3> = (0..4)
            .map(|i| particles.position(i) + particles.velocity(i) * 0.01)
            .collect();

        let mut sim = CpuSimulation::new(particles, grid, 0.0, constants::SOFTENING);
        sim.step(0.01);

        for (i, want) in expected.iter().enumerate() {
            assert_eq!(sim.particles().position(i), *want, "particle {i}");
        }
    }

    #[test]
    fn end_to_end_uniform_run_stays_finite_and_conserves_momentum() {
        let grid = small_world();
        let mut rng = StdRng::seed_from_u64(99);
        let particles = seed_particles(
            100,
            Distribution::Uniform,
            grid.world_min,
            grid.world_max,
            false,
            &mut rng,
        );
        let mut sim = CpuSimulation::new(particles, grid, 1.0e-4, constants::SOFTENING);

        let initial_momentum = sim.momentum();
        for _ in 0..10 {
            sim.step(0.01);
        }

        for i in 0..sim.particles().len() {
            assert!(sim.particles().position(i).is_finite());
            assert!(sim.particles().velocity(i).is_finite());
        }
        // Aggregated forces are only symmetric in expectation; allow a small
        // drift relative to the total momentum scale.
        let drift = (sim.momentum() - initial_momentum).length();
        assert!(drift < 5e-3, "momentum drifted by {drift}");
    }

    #[test]
    fn aggregates_rebuild_from_scratch_each_step() {
        let mut sim = uniform_sim(64, constants::DEFAULT_GRAVITY);
        sim.rebuild_aggregates();
        let first = sim.aggregates().total_mass();
        sim.rebuild_aggregates();
        assert_eq!(sim.aggregates().total_mass(), first);
    }

    #[test]
    fn cell_ids_track_particle_positions() {
        let mut sim = uniform_sim(32, 0.0);
        sim.rebuild_aggregates();
        for i in 0..sim.particles().len() {
            let expected = sim.grid().cell_index(sim.particles().position(i));
            assert_eq!(sim.cell_ids()[i], expected);
        }
    }
}
