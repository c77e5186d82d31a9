//! End-to-end scenarios, driven entirely through the public API: a deterministic identity
//! solver and a zero-valued background stats source, reading results back from the CSVs
//! `ThermalCalculator` writes (the same way a real caller would, since nothing here can reach
//! the crate's private power-map state).

use std::fs;
use std::io::{BufRead, BufReader};

use tempfile::TempDir;
use thermal_core::{
    Address, BackgroundStatsSource, Command, CommandType, Config, FloorplanGeometry, HaloGrid,
    MemoryType, ThermalCalculator, ThermalSolver,
};

struct IdentitySolver;

impl ThermalSolver for IdentitySolver {
    fn calculate_midx_array(
        &self,
        geometry: &FloorplanGeometry,
        _config: &Config,
    ) -> Vec<(usize, usize, f64)> {
        let layer_dim =
            ((geometry.dim_x + thermal_core::NUM_DUMMY) * (geometry.dim_y + thermal_core::NUM_DUMMY)) as usize;
        (0..layer_dim).map(|i| (i, i, 1.0)).collect()
    }

    fn calculate_cap_array(&self, geometry: &FloorplanGeometry, _config: &Config) -> Vec<f64> {
        vec![1.0; geometry.num_p as usize]
    }

    fn initialize_temperature(
        &self,
        geometry: &FloorplanGeometry,
        _config: &Config,
        tamb_kelvin: f64,
    ) -> Vec<f64> {
        let size = ((geometry.num_p * 3 + 1)
            * (geometry.dim_x + thermal_core::NUM_DUMMY)
            * (geometry.dim_y + thermal_core::NUM_DUMMY)) as usize;
        vec![tamb_kelvin; size]
    }

    fn transient_solve(
        &self,
        _geometry: &FloorplanGeometry,
        _config: &Config,
        _power: &HaloGrid,
        _midx: &[(usize, usize, f64)],
        _cap: &[f64],
        _time: f64,
        _iter: u32,
        prev_temperature: &[f64],
        _tamb_kelvin: f64,
    ) -> Vec<f64> {
        prev_temperature.to_vec()
    }

    fn steady_solve(
        &self,
        geometry: &FloorplanGeometry,
        _config: &Config,
        _power: &HaloGrid,
        _midx: &[(usize, usize, f64)],
        tamb_kelvin: f64,
    ) -> Vec<f64> {
        let size = ((geometry.num_p * 3 + 1)
            * (geometry.dim_x + thermal_core::NUM_DUMMY)
            * (geometry.dim_y + thermal_core::NUM_DUMMY)) as usize;
        vec![tamb_kelvin; size]
    }
}

struct ZeroStats;

impl BackgroundStatsSource for ZeroStats {
    fn sref_energy(&self, _channel: u32, _rank: u32) -> f64 {
        0.0
    }
    fn pre_stb_energy(&self, _channel: u32, _rank: u32) -> f64 {
        0.0
    }
    fn act_stb_energy(&self, _channel: u32, _rank: u32) -> f64 {
        0.0
    }
    fn pre_pd_energy(&self, _channel: u32, _rank: u32) -> f64 {
        0.0
    }
    fn epoch_read_commands(&self) -> u64 {
        0
    }
    fn epoch_write_commands(&self) -> u64 {
        0
    }
}

/// The config header every S1-S6 scenario below shares.
fn spec_config(dir: &TempDir) -> Config {
    Config {
        memory_type: MemoryType::Ddr,
        channels: 1,
        ranks: 1,
        bankgroups: 1,
        banks_per_group: 4,
        num_dies: 1,
        devices_per_rank: 1,
        bank_asr: 1.0,
        num_x_grids: 16,
        num_y_grids: 16,
        mat_x: 4,
        mat_y: 4,
        row_tile: 1,
        tile_row_num: 128,
        bl: 8,
        device_width: 4,
        chip_x: 1e-2,
        chip_y: 1e-2,
        t_ck_ns: 1.0,
        power_epoch_period: 1000,
        epoch_period: 1000,
        burst_cycle: 4,
        act_energy_inc: 1.0,
        read_energy_inc: 1000.0,
        write_energy_inc: 1000.0,
        ref_energy_inc: 1000.0,
        refb_energy_inc: 1000.0,
        num_row_refresh: 1,
        rows: 128,
        tamb0: 25.0,
        bank_order: 1,
        bank_layer_order: 1,
        loc_mapping: String::new(),
        output_level: 1,
        max_logic_power: 18.0,
        logic_const_bg_power: 3.0,
        bank_position_csv: dir.path().join("bank_position.csv").to_string_lossy().into_owned(),
        epoch_max_temp_file_csv: dir.path().join("epoch_max_temp.csv").to_string_lossy().into_owned(),
        epoch_temperature_file_csv: dir
            .path()
            .join("epoch_temperature.csv")
            .to_string_lossy()
            .into_owned(),
        final_temperature_file_csv: dir
            .path()
            .join("final_temperature.csv")
            .to_string_lossy()
            .into_owned(),
    }
}

/// `(case_id, power)` for every data row of a final-temperature CSV.
fn read_final_power_column(path: &str) -> Vec<(usize, f64)> {
    let file = fs::File::open(path).unwrap();
    let mut reader = BufReader::new(file);
    let mut header = String::new();
    reader.read_line(&mut header).unwrap();
    assert_eq!(header.trim(), "rank_channel_index,x,y,z,power,temperature");

    reader
        .lines()
        .map(|line| {
            let line = line.unwrap();
            let fields: Vec<&str> = line.split(',').collect();
            (fields[0].parse().unwrap(), fields[4].parse().unwrap())
        })
        .collect()
}

fn count_lines(path: &str) -> usize {
    fs::read_to_string(path).unwrap().lines().count()
}

/// S1. A single READ deposits `read_energy_inc / 1000 / device_scale` picojoules total,
/// spread evenly across the `BL * device_width` grid cells it touches, and crossing no epoch
/// boundary on its own (`power_epoch_period` is far larger than the single issue clock).
#[test]
fn s1_single_read_deposits_its_full_event_energy_and_fires_no_solve() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = spec_config(&dir);
    // Total deposited is collision-independent (P3): however many of the BL*device_width
    // burst-beat cells coincide on the same grid column, their values still sum to this.
    let expected_total = cfg.read_energy_inc / 1000.0 / f64::from(cfg.devices_per_rank);

    let mut calc = ThermalCalculator::new(cfg.clone(), &ZeroStats, IdentitySolver).unwrap();
    let cmd = Command::new(CommandType::Read, Address::new(0, 0, 0, 0, 0, 0), 0);
    calc.update_power(&cmd, 0, &ZeroStats).unwrap();
    calc.finalize(1, &ZeroStats).unwrap();

    let rows = read_final_power_column(&cfg.final_temperature_file_csv);
    let total: f64 = rows.iter().map(|&(_, p)| p).sum();
    assert!((total - expected_total).abs() < 1e-9, "total={total} expected={expected_total}");
    assert!(rows.iter().any(|&(_, p)| p != 0.0), "nothing was deposited");

    // power_epoch_period = 1000, and update_power was only ever called at clk=0: no epoch
    // boundary was crossed, so no transient solve ran.
    assert_eq!(count_lines(&cfg.epoch_max_temp_file_csv), 1);
}

/// S2. Enough identical READs to cross the `power_epoch_period` boundary exactly once trigger
/// exactly one transient solve (one `epoch_max_temp` row per layer — one layer, here).
#[test]
fn s2_crossing_the_epoch_boundary_fires_exactly_one_transient_solve() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = spec_config(&dir);
    let mut calc = ThermalCalculator::new(cfg.clone(), &ZeroStats, IdentitySolver).unwrap();

    for clk in 0..=1001u64 {
        let cmd = Command::new(CommandType::Read, Address::new(0, 0, 0, 0, 0, 0), clk);
        calc.update_power(&cmd, clk, &ZeroStats).unwrap();
    }

    // header + exactly one data row (numP == 1 for DDR).
    assert_eq!(count_lines(&cfg.epoch_max_temp_file_csv), 2);

    calc.finalize(1002, &ZeroStats).unwrap();
}

/// S3. One REFRESH spreads `ref_energy_inc` evenly across every bank, every bank receiving
/// the same total energy regardless of how its `numRowRefresh` row-stripes land on the grid.
#[test]
fn s3_refresh_spreads_energy_evenly_across_every_bank() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = spec_config(&dir);
    cfg.rows = 1024;
    cfg.num_row_refresh = 8;

    let banks = f64::from(cfg.banks());
    // Collision-independent total (P3): `numRowRefresh * numYgrids` row-stripe deposits per
    // bank sum to this regardless of how many land on the same grid cell.
    let expected_total_per_bank =
        cfg.ref_energy_inc / f64::from(cfg.num_row_refresh) / banks / f64::from(cfg.num_y_grids) / 1000.0
            * f64::from(cfg.num_row_refresh * cfg.num_y_grids);
    let expected_total = expected_total_per_bank * banks;

    let mut calc = ThermalCalculator::new(cfg.clone(), &ZeroStats, IdentitySolver).unwrap();
    let cmd = Command::new(CommandType::Refresh, Address::new(0, 0, 0, 0, 0, 0), 500);
    calc.update_power(&cmd, 500, &ZeroStats).unwrap();
    calc.finalize(1, &ZeroStats).unwrap();

    let rows = read_final_power_column(&cfg.final_temperature_file_csv);
    let total: f64 = rows.iter().map(|&(_, p)| p).sum();
    assert!((total - expected_total).abs() < 1e-9, "total={total} expected={expected_total}");
    assert!(rows.iter().any(|&(_, p)| p != 0.0), "nothing was deposited");
}

/// S5. An HMC topology's vault factorization always covers every channel (`vault_x * vault_y
/// == channels`) and no per-command energy deposit ever lands on the logic layer
/// (`z == numP - 1`); that layer is background-power-only (P6).
#[test]
fn s5_hmc_vaults_cover_every_channel_and_logic_layer_gets_no_command_energy() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = spec_config(&dir);
    cfg.memory_type = MemoryType::Hmc;
    cfg.num_dies = 4;
    cfg.channels = 16;
    cfg.ranks = 1;

    let geo = FloorplanGeometry::new(&cfg);
    assert_eq!(geo.num_p, 5);
    assert_eq!(geo.vault_x * geo.vault_y, cfg.channels);

    for channel in 0..cfg.channels {
        for bank in 0..cfg.banks() {
            let z = geo.map_to_z(&cfg, channel, bank);
            assert!(z < geo.num_p as i32 - 1, "channel {channel} bank {bank} mapped to logic layer");
        }
    }
}

/// S6. The final-temperature CSV always has exactly `num_case * numP * dimX * dimY` data rows,
/// whatever sequence of commands preceded `finalize`.
#[test]
fn s6_final_csv_has_exactly_one_row_per_grid_cell_per_case() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = spec_config(&dir);
    let geo = FloorplanGeometry::new(&cfg);
    let expected_rows = (geo.num_case * geo.num_p * geo.dim_x * geo.dim_y) as usize;

    let mut calc = ThermalCalculator::new(cfg.clone(), &ZeroStats, IdentitySolver).unwrap();
    let cmd = Command::new(CommandType::Activate, Address::new(0, 0, 0, 0, 0, 0), 0);
    calc.update_power(&cmd, 0, &ZeroStats).unwrap();
    calc.finalize(1_000_000, &ZeroStats).unwrap();

    assert_eq!(count_lines(&cfg.final_temperature_file_csv) - 1, expected_rows);
}

/// S4 (address-remap identity/bit-placement) and the rest of P1-P6/L1-L2/B1-B2 are covered by
/// `remap.rs`, `powermap.rs`, `background.rs`, and `geometry.rs`'s own inline `#[cfg(test)]`
/// modules, which can reach the crate-private state these end-to-end scenarios can't.
#[test]
fn s4_empty_loc_mapping_is_identity_through_the_public_api() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = spec_config(&dir);
    let remapper = thermal_core::AddressRemapper::parse(&cfg.loc_mapping, cfg.bl).unwrap();
    let a = Address::new(2, 0, 0, 0, 100, 5);
    assert_eq!(remapper.remap(&a), a);
}
