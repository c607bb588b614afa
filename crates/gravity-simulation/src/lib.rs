//! # Gravity grid simulation
//!
//! GPU pipeline for the grid-aggregated N-body update: per-frame binning,
//! per-cell mass/COM reduction and force integration as compute passes over
//! buffers shared zero-copy with a render pipeline.

pub mod controller;
pub mod error;
pub mod interop;
pub mod params;
pub mod simulation;

pub use controller::{SimState, SimulationController};
pub use error::SimulationError;
pub use interop::{BufferDomain, ComputeAccess, SharedBuffers};
pub use params::{SimParams, FIXED_POINT_SCALE, WORKGROUP_SIZE};
pub use simulation::GridSimulation;
