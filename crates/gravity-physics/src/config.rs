//! Simulation configuration and its boundary validation.
//!
//! Invalid configurations are rejected here, before any device resource is
//! touched; a failed validation leaves prior state untouched.

use std::fmt;

use glam::Vec3;

use crate::constants::{DEFAULT_GRAVITY, MAX_TIMESTEP, MIN_TIMESTEP, SOFTENING};
use crate::distribution::Distribution;
use crate::grid::GridSpec;

/// Everything the simulation needs to allocate and seed itself.
///
/// Capacity, grid resolution and world bounds are fixed for the lifetime of a
/// simulation; changing them means building a new one.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Buffer capacity in particles; `reset` may activate at most this many.
    pub capacity: u32,
    pub grid_dims: [u32; 3],
    pub world_min: Vec3,
    pub world_max: Vec3,
    pub gravity_constant: f32,
    pub softening: f32,
    pub min_timestep: f32,
    pub max_timestep: f32,
    /// Seed counter-rotating tangential velocities on reset.
    pub orbital_velocities: bool,
    /// Particle count activated by the initial seed.
    pub initial_particles: u32,
    pub initial_distribution: Distribution,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capacity: 50_000,
            grid_dims: [32, 32, 32],
            world_min: Vec3::splat(-1.0),
            world_max: Vec3::splat(1.0),
            gravity_constant: DEFAULT_GRAVITY,
            softening: SOFTENING,
            min_timestep: MIN_TIMESTEP,
            max_timestep: MAX_TIMESTEP,
            orbital_velocities: true,
            initial_particles: 20_000,
            initial_distribution: Distribution::Uniform,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity < 2 {
            return Err(ConfigError::CapacityTooSmall { capacity: self.capacity });
        }
        if self.grid_dims.iter().any(|&d| d == 0) {
            return Err(ConfigError::InvalidGridResolution { dims: self.grid_dims });
        }
        for axis in 0..3 {
            let (min, max) = (self.world_min[axis], self.world_max[axis]);
            if !(min < max) {
                return Err(ConfigError::DegenerateWorldBounds { axis, min, max });
            }
        }
        if !(self.min_timestep > 0.0 && self.min_timestep <= self.max_timestep) {
            return Err(ConfigError::InvalidTimestepBounds {
                min: self.min_timestep,
                max: self.max_timestep,
            });
        }
        if !(self.gravity_constant.is_finite() && self.gravity_constant >= 0.0) {
            return Err(ConfigError::InvalidGravity { value: self.gravity_constant });
        }
        self.validate_particle_count(self.initial_particles)
    }

    /// Reset-time count check: `2 <= n <= capacity`.
    pub fn validate_particle_count(&self, n: u32) -> Result<(), ConfigError> {
        if n < 2 || n > self.capacity {
            return Err(ConfigError::ParticleCountOutOfRange {
                requested: n,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    pub fn grid(&self) -> GridSpec {
        GridSpec::new(self.grid_dims, self.world_min, self.world_max)
    }

    /// Clamp a frame delta into the safe integration range.
    pub fn clamp_timestep(&self, dt: f32) -> f32 {
        dt.clamp(self.min_timestep, self.max_timestep)
    }
}

/// Configuration rejected at the API boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    CapacityTooSmall { capacity: u32 },
    ParticleCountOutOfRange { requested: u32, capacity: u32 },
    InvalidGridResolution { dims: [u32; 3] },
    DegenerateWorldBounds { axis: usize, min: f32, max: f32 },
    InvalidTimestepBounds { min: f32, max: f32 },
    InvalidGravity { value: f32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::CapacityTooSmall { capacity } => {
                write!(f, "particle capacity {capacity} is below the minimum of 2")
            }
            ConfigError::ParticleCountOutOfRange { requested, capacity } => {
                write!(f, "particle count {requested} outside [2, {capacity}]")
            }
            ConfigError::InvalidGridResolution { dims } => {
                write!(f, "grid resolution {dims:?} must be positive on every axis")
            }
            ConfigError::DegenerateWorldBounds { axis, min, max } => {
                write!(f, "world bounds degenerate on axis {axis}: min {min} >= max {max}")
            }
            ConfigError::InvalidTimestepBounds { min, max } => {
                write!(f, "timestep bounds [{min}, {max}] invalid")
            }
            ConfigError::InvalidGravity { value } => {
                write!(f, "gravitational constant {value} must be finite and non-negative")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_grid_axis() {
        let config = SimulationConfig { grid_dims: [32, 0, 32], ..Default::default() };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidGridResolution { .. })
        ));
    }

    #[test]
    fn rejects_degenerate_bounds() {
        let config = SimulationConfig {
            world_min: Vec3::new(-1.0, 1.0, -1.0),
            world_max: Vec3::new(1.0, 1.0, 1.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DegenerateWorldBounds { axis: 1, .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_particle_counts() {
        let config = SimulationConfig { capacity: 100, initial_particles: 50, ..Default::default() };
        assert!(config.validate_particle_count(1).is_err());
        assert!(config.validate_particle_count(101).is_err());
        assert!(config.validate_particle_count(2).is_ok());
        assert!(config.validate_particle_count(100).is_ok());
    }

    #[test]
    fn timestep_clamps_into_bounds() {
        let config = SimulationConfig::default();
        assert_eq!(config.clamp_timestep(10.0), config.max_timestep);
        assert_eq!(config.clamp_timestep(0.0), config.min_timestep);
        assert_eq!(config.clamp_timestep(5.0e-4), 5.0e-4);
    }
}
