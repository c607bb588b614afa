//! Simulation lifecycle: parameter ownership, the per-frame protocol and the
//! reset path.
//!
//! The controller is the only mutator of simulation parameters. Each `update`
//! captures them once into a `SimParams` snapshot, acquires the shared
//! buffers for the compute domain, submits the three-phase dispatch and
//! releases the buffers back to the graphics domain (draining the queue).

use glam::Vec3;
use gravity_physics::{seed_particles, ConfigError, Distribution, ParticleSet, SimulationConfig};

use crate::error::SimulationError;
use crate::params::SimParams;
use crate::simulation::GridSimulation;

/// Lifecycle state. `Uninitialized` has no representation: a failed
/// constructor returns an error and no controller exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Buffers and kernels are ready; no dispatch has run since the last
    /// construction or reset.
    Ready,
    /// Per-frame dispatches are being submitted.
    Running,
    /// Dispatch is suppressed; parameter edits still apply.
    Paused,
}

/// Owner of the simulation parameters and driver of the per-frame protocol.
pub struct SimulationController {
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: SimulationConfig,
    sim: GridSimulation,
    state: SimState,
    current_n: u32,
    gravity_constant: f32,
    /// Host-side copy of the last seeded state; masses never change after a
    /// reset, so this is what momentum accounting reads them from.
    seeded: ParticleSet,
}

impl SimulationController {
    /// Validate `config`, allocate all device resources and seed the initial
    /// particle state.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let sim = GridSimulation::new(&device, &config)?;

        let mut controller = Self {
            device,
            queue,
            gravity_constant: config.gravity_constant,
            sim,
            state: SimState::Ready,
            current_n: 0,
            seeded: ParticleSet::default(),
            config,
        };
        controller.reset(
            controller.config.initial_particles,
            controller.config.initial_distribution,
        )?;
        log::info!(
            "Simulation ready: {} particles, grid {:?}",
            controller.current_n,
            controller.config.grid_dims
        );
        Ok(controller)
    }

    /// Advance the simulation by `delta_seconds` (clamped into the safe
    /// timestep range). No-op while paused.
    pub fn update(&mut self, delta_seconds: f32) {
        if self.state == SimState::Paused {
            return;
        }
        self.state = SimState::Running;

        let dt = self.config.clamp_timestep(delta_seconds);
        let params = SimParams::snapshot(
            &self.config.grid(),
            self.current_n,
            self.gravity_constant,
            self.config.softening,
            dt,
        );

        // The guard hands the buffers back to the graphics domain and drains
        // the queue on drop, also on any early exit below it.
        let access = self.sim.shared().acquire_compute(&self.device);
        self.sim.step(&self.device, &self.queue, &params);
        access.release();
    }

    /// Re-seed the whole particle state: `particle_count` particles laid out
    /// by `distribution`, velocities per the configured seeding, unit masses.
    ///
    /// The only path that changes the active count. Rejected counts leave the
    /// previous state untouched.
    pub fn reset(
        &mut self,
        particle_count: u32,
        distribution: Distribution,
    ) -> Result<(), SimulationError> {
        self.config.validate_particle_count(particle_count)?;
        let mut rng = rand::rng();
        let particles = seed_particles(
            particle_count,
            distribution,
            self.config.world_min,
            self.config.world_max,
            self.config.orbital_velocities,
            &mut rng,
        );
        self.reset_from(particles)
    }

    /// Deterministic variant of `reset`: upload an explicit particle set
    /// (used by parity tests and scripted scenarios).
    pub fn reset_from(&mut self, particles: ParticleSet) -> Result<(), SimulationError> {
        let n = particles.len() as u32;
        self.config.validate_particle_count(n)?;
        self.sim.upload(&self.queue, &particles);
        self.seeded = particles;
        self.current_n = n;
        self.state = SimState::Ready;
        log::debug!("Reset to {n} particles");
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state == SimState::Running {
            self.state = SimState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == SimState::Paused {
            self.state = SimState::Running;
        }
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn particle_count(&self) -> u32 {
        self.current_n
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn set_gravity_constant(&mut self, g: f32) -> Result<(), SimulationError> {
        if !(g.is_finite() && g >= 0.0) {
            return Err(ConfigError::InvalidGravity { value: g }.into());
        }
        self.gravity_constant = g;
        Ok(())
    }

    pub fn gravity_constant(&self) -> f32 {
        self.gravity_constant
    }

    pub fn set_timestep_bounds(&mut self, min: f32, max: f32) -> Result<(), SimulationError> {
        if !(min > 0.0 && min <= max) {
            return Err(ConfigError::InvalidTimestepBounds { min, max }.into());
        }
        self.config.min_timestep = min;
        self.config.max_timestep = max;
        Ok(())
    }

    /// Position buffer for the render pipeline (STORAGE | VERTEX usage).
    /// Valid for graphics use between `update` calls, after the release step
    /// has drained the compute queue.
    pub fn positions_buffer(&self) -> &wgpu::Buffer {
        &self.sim.shared().positions
    }

    /// Velocity buffer, same validity rules as `positions_buffer`.
    pub fn velocities_buffer(&self) -> &wgpu::Buffer {
        &self.sim.shared().velocities
    }

    /// Masses of the seeded particles (constant between resets).
    pub fn masses(&self) -> &[f32] {
        &self.seeded.masses
    }

    /// Read back the active positions. Blocking; readback/debug path.
    pub fn read_positions(&self) -> Vec<[f32; 4]> {
        self.sim.read_positions(&self.device, &self.queue, self.current_n)
    }

    /// Read back the active velocities. Blocking; readback/debug path.
    pub fn read_velocities(&self) -> Vec<[f32; 4]> {
        self.sim.read_velocities(&self.device, &self.queue, self.current_n)
    }

    /// Read back the resolved per-cell masses. Blocking; readback/debug path.
    pub fn read_cell_masses(&self) -> Vec<f32> {
        self.sim.read_cell_masses(&self.device, &self.queue)
    }

    /// Read back the per-particle cell ids. Blocking; readback/debug path.
    pub fn read_cell_indices(&self) -> Vec<u32> {
        self.sim.read_cell_indices(&self.device, &self.queue, self.current_n)
    }

    /// Total momentum from the device-side velocities and host-side masses.
    pub fn momentum(&self) -> Vec3 {
        let velocities = self.read_velocities();
        let mut p = Vec3::ZERO;
        for (v, &m) in velocities.iter().zip(self.seeded.masses.iter()) {
            p += m * Vec3::new(v[0], v[1], v[2]);
        }
        p
    }
}
