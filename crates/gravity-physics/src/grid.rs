//! Uniform spatial grid: world bounds, clamped cell indexing and the per-cell
//! mass/center-of-mass reduction.
//!
//! The flat cell id layout (`x + y*nx + z*nx*ny`) matches the GPU buffers
//! one-to-one so CPU and GPU results are directly comparable.

use glam::Vec3;

use crate::constants::MASS_EPSILON;

/// Axis-aligned world box partitioned into `dims` uniform cells per axis.
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub dims: [u32; 3],
    pub world_min: Vec3,
    pub world_max: Vec3,
}

impl GridSpec {
    pub fn new(dims: [u32; 3], world_min: Vec3, world_max: Vec3) -> Self {
        Self { dims, world_min, world_max }
    }

    /// Cell edge length per axis. Strictly positive for validated bounds.
    pub fn cell_size(&self) -> Vec3 {
        (self.world_max - self.world_min)
            / Vec3::new(self.dims[0] as f32, self.dims[1] as f32, self.dims[2] as f32)
    }

    pub fn cell_size_inv(&self) -> Vec3 {
        self.cell_size().recip()
    }

    pub fn total_cells(&self) -> usize {
        self.dims[0] as usize * self.dims[1] as usize * self.dims[2] as usize
    }

    /// Cell coordinate for a position, clamped into the grid per axis.
    ///
    /// Out-of-range positions land in boundary cells, so every particle keeps
    /// contributing mass to exactly one cell. A position exactly on
    /// `world_max` maps to the last cell, never one past it.
    #[inline]
    pub fn cell_coord(&self, p: Vec3) -> [u32; 3] {
        let rel = (p - self.world_min) * self.cell_size_inv();
        [
            rel.x.floor().max(0.0).min((self.dims[0] - 1) as f32) as u32,
            rel.y.floor().max(0.0).min((self.dims[1] - 1) as f32) as u32,
            rel.z.floor().max(0.0).min((self.dims[2] - 1) as f32) as u32,
        ]
    }

    /// Flat cell id for a position. Pure function of the position and this
    /// grid configuration.
    #[inline]
    pub fn cell_index(&self, p: Vec3) -> u32 {
        let [cx, cy, cz] = self.cell_coord(p);
        cx + cy * self.dims[0] + cz * self.dims[0] * self.dims[1]
    }
}

/// Per-cell total mass and mass-weighted position sums.
///
/// Rebuilt from scratch every step; nothing persists across frames.
#[derive(Debug, Clone)]
pub struct CellAggregates {
    pub mass: Vec<f32>,
    pub weighted: Vec<Vec3>,
}

impl CellAggregates {
    pub fn new(total_cells: usize) -> Self {
        Self {
            mass: vec![0.0; total_cells],
            weighted: vec![Vec3::ZERO; total_cells],
        }
    }

    pub fn clear(&mut self) {
        self.mass.fill(0.0);
        self.weighted.fill(Vec3::ZERO);
    }

    #[inline]
    pub fn accumulate(&mut self, cell: u32, mass: f32, position: Vec3) {
        self.mass[cell as usize] += mass;
        self.weighted[cell as usize] += mass * position;
    }

    /// Center of mass of a cell, or `None` when the cell holds no mass.
    pub fn com(&self, cell: usize) -> Option<Vec3> {
        let m = self.mass[cell];
        if m > MASS_EPSILON {
            Some(self.weighted[cell] / m)
        } else {
            None
        }
    }

    pub fn total_mass(&self) -> f32 {
        self.mass.iter().map(|&m| m as f64).sum::<f64>() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_grid() -> GridSpec {
        GridSpec::new([8, 8, 8], Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn cell_size_is_uniform() {
        let grid = unit_grid();
        assert_eq!(grid.cell_size(), Vec3::splat(0.25));
        assert_eq!(grid.total_cells(), 512);
    }

    #[test]
    fn cell_index_is_deterministic() {
        let grid = unit_grid();
        let p = Vec3::new(0.3, -0.7, 0.999);
        let first = grid.cell_index(p);
        for _ in 0..10 {
            assert_eq!(grid.cell_index(p), first);
        }
    }

    #[test]
    fn world_max_maps_to_last_cell() {
        let grid = unit_grid();
        assert_eq!(grid.cell_coord(Vec3::splat(1.0)), [7, 7, 7]);
        assert_eq!(grid.cell_coord(Vec3::new(1.0, 0.0, -1.0)), [7, 4, 0]);
    }

    #[test]
    fn out_of_range_positions_clamp_to_boundary_cells() {
        let grid = unit_grid();
        assert_eq!(grid.cell_coord(Vec3::splat(-5.0)), [0, 0, 0]);
        assert_eq!(grid.cell_coord(Vec3::new(42.0, -42.0, 0.0)), [7, 0, 4]);
    }

    #[test]
    fn flat_index_layout_is_x_then_y_then_z() {
        let grid = unit_grid();
        // One cell step in y advances the flat id by nx, in z by nx*ny.
        let base = grid.cell_index(Vec3::new(-0.9, -0.9, -0.9));
        assert_eq!(grid.cell_index(Vec3::new(-0.9, -0.65, -0.9)), base + 8);
        assert_eq!(grid.cell_index(Vec3::new(-0.9, -0.9, -0.65)), base + 64);
    }

    #[test]
    fn empty_cell_has_no_com() {
        let agg = CellAggregates::new(8);
        assert_eq!(agg.com(3), None);
    }

    #[test]
    fn com_is_mass_weighted() {
        let mut agg = CellAggregates::new(1);
        agg.accumulate(0, 1.0, Vec3::new(0.0, 0.0, 0.0));
        agg.accumulate(0, 3.0, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(agg.com(0), Some(Vec3::new(3.0, 0.0, 0.0)));
        assert_eq!(agg.total_mass(), 4.0);
    }
}
