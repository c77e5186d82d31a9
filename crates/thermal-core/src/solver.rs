//! The boundary between power accounting and the temperature solver proper.
//!
//! The original calls five free `extern "C"` routines directly
//! (`calculate_Midx_array`, `calculate_Cap_array`, `initialize_Temperature`,
//! `transient_thermal_solver`, `steady_thermal_solver`). This crate narrows that to a trait so
//! a deterministic reference implementation (`thermal-solver::ReferenceSolver`) can stand in
//! without this crate claiming any physical validation of it (explicit Non-goal).

use crate::config::{Config, NUM_DUMMY};
use crate::geometry::FloorplanGeometry;

/// Thermal conductance/capacitance network and the temperature field it operates on, isolated
/// behind a trait boundary so callers can supply any solver with matching numeric contracts.
pub trait ThermalSolver {
    /// Build the inter-cell conductance list: each entry is `(cell_a, cell_b, conductance)`
    /// over the halo-padded grid.
    fn calculate_midx_array(&self, geometry: &FloorplanGeometry, config: &Config) -> Vec<(usize, usize, f64)>;

    /// Per-layer thermal capacitance, indexed by `layer_index(l) = l * 3`.
    fn calculate_cap_array(&self, geometry: &FloorplanGeometry, config: &Config) -> Vec<f64>;

    /// Initial (uniform ambient) temperature field over the halo-padded grid, flattened the
    /// same way [`HaloGrid`] describes.
    fn initialize_temperature(
        &self,
        geometry: &FloorplanGeometry,
        config: &Config,
        tamb_kelvin: f64,
    ) -> Vec<f64>;

    /// Advance the temperature field by `time` seconds over `iter` sub-steps, given the
    /// halo-padded power map for one case and the previous temperature field.
    fn transient_solve(
        &self,
        geometry: &FloorplanGeometry,
        config: &Config,
        power: &HaloGrid,
        midx: &[(usize, usize, f64)],
        cap: &[f64],
        time: f64,
        iter: u32,
        prev_temperature: &[f64],
        tamb_kelvin: f64,
    ) -> Vec<f64>;

    /// Solve for the steady-state temperature field given the halo-padded power map.
    fn steady_solve(
        &self,
        geometry: &FloorplanGeometry,
        config: &Config,
        power: &HaloGrid,
        midx: &[(usize, usize, f64)],
        tamb_kelvin: f64,
    ) -> Vec<f64>;
}

/// A `dimX+halo` by `dimY+halo` by `numP` power map, halo cells zero-padded, indexed
/// `[x + dummy/2][y + dummy/2][layer]` by the constructor and flattened row-major by `layer`
/// outermost for the solver boundary (`x*dimY_h + y` within a layer — mirrors the original's
/// `double***` layout without the pointer chasing).
#[derive(Debug, Clone)]
pub struct HaloGrid {
    dim_x_h: u32,
    dim_y_h: u32,
    num_p: u32,
    cells: Vec<f64>,
}

impl HaloGrid {
    /// Build the halo-padded power map for one case from the flat `power_map` (indexed
    /// `layer*dimX*dimY + y*dimX + x`, no halo), dividing every cell by `div` (the epoch
    /// length for the transient solve, or the elapsed clock for the final solve).
    #[must_use]
    pub fn from_power_map(geometry: &FloorplanGeometry, power_map: &[f64], div: f64) -> Self {
        let dim_x_h = geometry.dim_x + NUM_DUMMY;
        let dim_y_h = geometry.dim_y + NUM_DUMMY;
        let half = NUM_DUMMY / 2;
        let mut cells = vec![0.0; (dim_x_h * dim_y_h * geometry.num_p) as usize];

        for i in 0..geometry.dim_x {
            for j in 0..geometry.dim_y {
                for l in 0..geometry.num_p {
                    let src = (l * geometry.dim_x * geometry.dim_y + j * geometry.dim_x + i) as usize;
                    let dst_x = i + half;
                    let dst_y = j + half;
                    let dst = (l * dim_x_h * dim_y_h + dst_y * dim_x_h + dst_x) as usize;
                    cells[dst] = power_map[src] / div;
                }
            }
        }

        Self {
            dim_x_h,
            dim_y_h,
            num_p: geometry.num_p,
            cells,
        }
    }

    #[must_use]
    pub fn dim_x_h(&self) -> u32 {
        self.dim_x_h
    }

    #[must_use]
    pub fn dim_y_h(&self) -> u32 {
        self.dim_y_h
    }

    #[must_use]
    pub fn num_p(&self) -> u32 {
        self.num_p
    }

    #[must_use]
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// Sum of power over the real (non-halo) grid cells, all layers.
    #[must_use]
    pub fn total_power(&self, geometry: &FloorplanGeometry) -> f64 {
        let half = NUM_DUMMY / 2;
        let mut total = 0.0;
        for i in 0..geometry.dim_x {
            for j in 0..geometry.dim_y {
                for l in 0..geometry.num_p {
                    let x = i + half;
                    let y = j + half;
                    let idx = (l * self.dim_x_h * self.dim_y_h + y * self.dim_x_h + x) as usize;
                    total += self.cells[idx];
                }
            }
        }
        total
    }
}

/// Per-layer temperature-field z-offset: layer `l`'s slab starts at flattened layer index
/// `l * 3` (two buffer layers per physical layer in the solver's stencil), +1 cell into that
/// slab for the layer's own temperature plane.
#[must_use]
pub fn layer_plane_offset(layer: u32) -> u32 {
    layer * 3
}

/// Derive the transient solver's sub-step count: start from `time_iter0` and keep doubling^H
/// incrementing until each sub-step is no coarser than the conductance network's own stability
/// limit `dt`.
///
/// `dt` is the minimum `Cap[layer] / conductance` over every diagonal (`cell_a == cell_b`)
/// entry of `midx`; `time_iter0` is the floor below which sub-stepping is never refined,
/// preserved from the original's hardcoded starting guess.
#[must_use]
pub fn calculate_time_step(
    midx: &[(usize, usize, f64)],
    cap: &[f64],
    layer_dim: usize,
    power_epoch_time_s: f64,
    time_iter0: u32,
) -> u32 {
    let mut dt = 100.0_f64;
    for &(a, b, g) in midx {
        if a == b {
            let idx_c = a / layer_dim;
            let c = cap[idx_c];
            if c / g < dt {
                dt = c / g;
            }
        }
    }

    let mut time_iter = time_iter0;
    while power_epoch_time_s / f64::from(time_iter) >= dt {
        time_iter += 1;
    }
    time_iter
}
