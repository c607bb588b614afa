//! Per-dispatch parameter snapshot shared with the WGSL kernels.

use bytemuck::{Pod, Zeroable};
use gravity_physics::GridSpec;

/// Fixed-point scale for the aggregation atomics (2^14).
///
/// `capacity * max_mass * FIXED_POINT_SCALE` must stay below `i32::MAX`; with
/// the default capacity of 50_000 unit-mass particles the headroom factor is
/// about 2.6.
pub const FIXED_POINT_SCALE: f32 = 16384.0;

/// Threads per workgroup for every compute kernel. Must match the
/// `@workgroup_size` attributes in `shaders/`.
pub const WORKGROUP_SIZE: u32 = 128;

/// Uniform block read by every kernel.
///
/// Captured once per frame before submission, so all three phases of one
/// dispatch see the same values. Field order and padding mirror the WGSL
/// `SimParams` struct (each `vec3` is padded to 16 bytes by the scalar that
/// follows it).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub world_min: [f32; 3],
    pub particle_count: u32,
    pub cell_size_inv: [f32; 3],
    pub total_cells: u32,
    pub grid_dims: [u32; 3],
    pub _pad: u32,
    pub gravity_constant: f32,
    pub delta_time: f32,
    pub softening: f32,
    pub fixed_scale: f32,
}

impl SimParams {
    /// Snapshot the controller's current parameters for one dispatch.
    pub fn snapshot(
        grid: &GridSpec,
        particle_count: u32,
        gravity_constant: f32,
        softening: f32,
        delta_time: f32,
    ) -> Self {
        Self {
            world_min: grid.world_min.to_array(),
            particle_count,
            cell_size_inv: grid.cell_size_inv().to_array(),
            total_cells: grid.total_cells() as u32,
            grid_dims: grid.dims,
            _pad: 0,
            gravity_constant,
            delta_time,
            softening,
            fixed_scale: FIXED_POINT_SCALE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn layout_matches_the_wgsl_uniform() {
        // 4 rows of 16 bytes.
        assert_eq!(std::mem::size_of::<SimParams>(), 64);
    }

    #[test]
    fn snapshot_copies_grid_geometry() {
        let grid = GridSpec::new([8, 4, 2], Vec3::splat(-1.0), Vec3::splat(1.0));
        let params = SimParams::snapshot(&grid, 100, 1e-4, 1e-4, 0.01);
        assert_eq!(params.total_cells, 64);
        assert_eq!(params.grid_dims, [8, 4, 2]);
        assert_eq!(params.cell_size_inv, grid.cell_size_inv().to_array());
        assert_eq!(params.particle_count, 100);
    }
}
