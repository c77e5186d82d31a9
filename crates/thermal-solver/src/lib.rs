//! # thermal-solver
//!
//! A deterministic finite-difference [`ThermalSolver`] for `thermal-core`: a same-process,
//! explicit-Euler (transient) / Jacobi-relaxation (steady) RC-network solve over the
//! halo-padded power grid.
//!
//! This is explicitly **not** a validated physical model (`thermal-core`'s own Non-goal): it
//! exists so the workspace builds and runs end-to-end without an external linear-algebra
//! dependency. The lateral/vertical conductances are derived from generic silicon constants
//! and the configured chip dimensions, not from any real process technology.

use log::{debug, info};
use thermal_core::{Config, FloorplanGeometry, HaloGrid, ThermalSolver, NUM_DUMMY};

/// Bulk silicon thermal conductivity, W/(m*K).
const SILICON_K: f64 = 150.0;
/// Effective cross-layer (TSV/microbump) thermal conductivity, W/(m*K) — lower than bulk
/// silicon since it lumps together several real interconnect and bonding materials.
const VERTICAL_K: f64 = 50.0;
/// Assumed per-layer die thickness, meters.
const LAYER_THICKNESS_M: f64 = 50e-6;
/// Silicon volumetric heat capacity, J/(m^3*K).
const VOLUMETRIC_HEAT_CAPACITY: f64 = 1.63e6;
/// Steady-state relaxation step count. Fixed rather than convergence-checked: keeps the solve
/// deterministic and bounded without a tolerance parameter to tune.
const STEADY_ITERATIONS: u32 = 2000;

/// Finite-difference stand-in for the original's external solver routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceSolver;

fn cell_index(dim_x_h: u32, dim_y_h: u32, plane: u32, y: u32, x: u32) -> usize {
    let plane_size = (dim_x_h * dim_y_h) as usize;
    plane as usize * plane_size + (y * dim_x_h + x) as usize
}

fn is_boundary(dim_x_h: u32, dim_y_h: u32, idx: usize) -> bool {
    let plane_size = (dim_x_h * dim_y_h) as usize;
    let within_plane = idx % plane_size;
    let x = within_plane as u32 % dim_x_h;
    let y = within_plane as u32 / dim_x_h;
    x == 0 || y == 0 || x == dim_x_h - 1 || y == dim_y_h - 1
}

/// Own-plane index of layer `l`: `layer_plane_offset(l) + 1`, i.e. `l*3 + 1` — two interconnect
/// planes precede each layer's temperature plane, one more follows the stack's last layer.
fn layer_of_plane(plane: usize) -> Option<u32> {
    if plane % 3 == 1 {
        Some((plane / 3) as u32)
    } else {
        None
    }
}

/// Conductance network adjacency (off-diagonal) and total outgoing conductance per cell
/// (diagonal), built once per solve from the chip's geometry and the configured lateral/
/// vertical conductance constants.
struct Network {
    dim_x_h: u32,
    dim_y_h: u32,
    adjacency: Vec<Vec<(usize, f64)>>,
    g_total: Vec<f64>,
}

impl Network {
    fn build(geometry: &FloorplanGeometry, config: &Config) -> Self {
        let dim_x_h = geometry.dim_x + NUM_DUMMY;
        let dim_y_h = geometry.dim_y + NUM_DUMMY;
        let planes = geometry.num_p * 3 + 1;
        let size = (planes * dim_x_h * dim_y_h) as usize;

        let cell_x = config.chip_x / f64::from(dim_x_h);
        let cell_y = config.chip_y / f64::from(dim_y_h);
        let g_x = SILICON_K * cell_y * LAYER_THICKNESS_M / cell_x;
        let g_y = SILICON_K * cell_x * LAYER_THICKNESS_M / cell_y;
        let g_z = VERTICAL_K * cell_x * cell_y / LAYER_THICKNESS_M;
        debug!("conductance network: g_x={g_x:.3e} g_y={g_y:.3e} g_z={g_z:.3e} W/K");

        let mut adjacency = vec![Vec::new(); size];
        let mut g_total = vec![0.0; size];

        for p in 0..planes {
            for y in 1..dim_y_h - 1 {
                for x in 1..dim_x_h - 1 {
                    let a = cell_index(dim_x_h, dim_y_h, p, y, x);
                    for (ny, nx, g) in [
                        (y - 1, x, g_y),
                        (y + 1, x, g_y),
                        (y, x - 1, g_x),
                        (y, x + 1, g_x),
                    ] {
                        let b = cell_index(dim_x_h, dim_y_h, p, ny, nx);
                        adjacency[a].push((b, g));
                        g_total[a] += g;
                    }
                    if p + 1 < planes {
                        let b = cell_index(dim_x_h, dim_y_h, p + 1, y, x);
                        adjacency[a].push((b, g_z));
                        adjacency[b].push((a, g_z));
                        g_total[a] += g_z;
                        g_total[b] += g_z;
                    }
                }
            }
        }

        Self {
            dim_x_h,
            dim_y_h,
            adjacency,
            g_total,
        }
    }
}

impl ThermalSolver for ReferenceSolver {
    fn calculate_midx_array(&self, geometry: &FloorplanGeometry, config: &Config) -> Vec<(usize, usize, f64)> {
        let net = Network::build(geometry, config);
        let mut entries = Vec::new();
        for (a, neighbors) in net.adjacency.iter().enumerate() {
            for &(b, g) in neighbors {
                entries.push((a, b, g));
            }
        }
        for (a, &g) in net.g_total.iter().enumerate() {
            if g > 0.0 {
                entries.push((a, a, g));
            }
        }
        entries
    }

    fn calculate_cap_array(&self, geometry: &FloorplanGeometry, config: &Config) -> Vec<f64> {
        let dim_x_h = geometry.dim_x + NUM_DUMMY;
        let dim_y_h = geometry.dim_y + NUM_DUMMY;
        let cell_x = config.chip_x / f64::from(dim_x_h);
        let cell_y = config.chip_y / f64::from(dim_y_h);
        let cap_per_cell = VOLUMETRIC_HEAT_CAPACITY * cell_x * cell_y * LAYER_THICKNESS_M;
        let planes = (geometry.num_p * 3 + 1) as usize;
        vec![cap_per_cell; planes]
    }

    fn initialize_temperature(&self, geometry: &FloorplanGeometry, _config: &Config, tamb_kelvin: f64) -> Vec<f64> {
        let dim_x_h = geometry.dim_x + NUM_DUMMY;
        let dim_y_h = geometry.dim_y + NUM_DUMMY;
        let planes = (geometry.num_p * 3 + 1) as usize;
        vec![tamb_kelvin; planes * (dim_x_h * dim_y_h) as usize]
    }

    fn transient_solve(
        &self,
        geometry: &FloorplanGeometry,
        _config: &Config,
        power: &HaloGrid,
        midx: &[(usize, usize, f64)],
        cap: &[f64],
        time: f64,
        iter: u32,
        prev_temperature: &[f64],
        tamb_kelvin: f64,
    ) -> Vec<f64> {
        let dim_x_h = geometry.dim_x + NUM_DUMMY;
        let dim_y_h = geometry.dim_y + NUM_DUMMY;
        let plane_size = (dim_x_h * dim_y_h) as usize;

        let mut t = prev_temperature.to_vec();
        for cell in t.iter_mut() {
            if !cell.is_finite() {
                *cell = tamb_kelvin;
            }
        }
        let steps = iter.max(1);
        let dt = time / f64::from(steps);

        for _ in 0..steps {
            let mut flux = vec![0.0_f64; t.len()];
            for &(a, b, g) in midx {
                if a != b {
                    flux[a] += g * (t[b] - t[a]);
                }
            }
            for a in 0..t.len() {
                if is_boundary(dim_x_h, dim_y_h, a) {
                    continue;
                }
                let idx_c = a / plane_size;
                let c = cap[idx_c];
                let p = layer_of_plane(idx_c)
                    .map_or(0.0, |l| power_per_cell(power, l, a, plane_size, dim_x_h));
                t[a] += dt / c * (flux[a] + p);
            }
        }
        info!("transient solve advanced {steps} sub-steps of {dt:.3e} s each");
        t
    }

    fn steady_solve(
        &self,
        geometry: &FloorplanGeometry,
        _config: &Config,
        power: &HaloGrid,
        midx: &[(usize, usize, f64)],
        tamb_kelvin: f64,
    ) -> Vec<f64> {
        let dim_x_h = geometry.dim_x + NUM_DUMMY;
        let dim_y_h = geometry.dim_y + NUM_DUMMY;
        let plane_size = (dim_x_h * dim_y_h) as usize;
        let planes = geometry.num_p * 3 + 1;
        let size = (planes as usize) * plane_size;

        let mut adjacency = vec![Vec::new(); size];
        let mut g_total = vec![0.0_f64; size];
        for &(a, b, g) in midx {
            if a == b {
                g_total[a] = g;
            } else {
                adjacency[a].push((b, g));
            }
        }

        let mut t = vec![tamb_kelvin; size];
        for _ in 0..STEADY_ITERATIONS {
            let prev = t.clone();
            for a in 0..size {
                if is_boundary(dim_x_h, dim_y_h, a) || g_total[a] <= 0.0 {
                    continue;
                }
                let idx_c = a / plane_size;
                let p = layer_of_plane(idx_c)
                    .map_or(0.0, |l| power_per_cell(power, l, a, plane_size, dim_x_h));
                let neighbor_sum: f64 = adjacency[a].iter().map(|&(b, g)| g * prev[b]).sum();
                t[a] = (neighbor_sum + p) / g_total[a];
            }
        }
        info!("steady solve ran {STEADY_ITERATIONS} relaxation passes");
        t
    }
}

fn power_per_cell(power: &HaloGrid, layer: u32, global_idx: usize, plane_size: usize, dim_x_h: u32) -> f64 {
    let within_plane = global_idx % plane_size;
    let x = within_plane as u32 % dim_x_h;
    let y = within_plane as u32 / dim_x_h;
    let idx = (layer * dim_x_h * power.dim_y_h() + y * dim_x_h + x) as usize;
    power.cells().get(idx).copied().unwrap_or(0.0)
}
