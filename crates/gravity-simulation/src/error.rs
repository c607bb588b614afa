//! Error taxonomy for device-facing initialization and reset.

use std::fmt;

use gravity_physics::ConfigError;

/// Everything that can go wrong building or re-seeding the simulation.
///
/// Device-side failures (`BufferAllocation`, `KernelBuild`) are fatal to
/// initialization: the constructor returns the error and no partially-created
/// resources escape. `Config` errors leave prior state untouched.
#[derive(Debug)]
pub enum SimulationError {
    /// Rejected configuration or reset request.
    Config(ConfigError),
    /// Device buffer allocation failed at the requested capacity.
    BufferAllocation { label: &'static str, message: String },
    /// Shader compilation or pipeline creation failed; carries the device's
    /// validation log.
    KernelBuild { log: String },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Config(e) => write!(f, "invalid configuration: {e}"),
            SimulationError::BufferAllocation { label, message } => {
                write!(f, "failed to allocate {label}: {message}")
            }
            SimulationError::KernelBuild { log } => {
                write!(f, "kernel build failed:\n{log}")
            }
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for SimulationError {
    fn from(e: ConfigError) -> Self {
        SimulationError::Config(e)
    }
}
