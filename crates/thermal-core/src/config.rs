//! DRAM topology, timing, energy, and thermal configuration.
//!
//! Mirrors the `Config` member list read by `ThermalCalculator`'s constructor in the
//! original source: everything geometry, energy accounting, and output routing need, and
//! nothing the command scheduler/timing engine needs (that lives outside this crate).

use serde::{Deserialize, Serialize};

/// Logical DRAM address: `(channel, rank, bankgroup, bank, row, column)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address {
    pub channel: u32,
    pub rank: u32,
    pub bankgroup: u32,
    pub bank: u32,
    pub row: u32,
    pub column: u32,
}

impl Address {
    #[must_use]
    pub fn new(channel: u32, rank: u32, bankgroup: u32, bank: u32, row: u32, column: u32) -> Self {
        Self {
            channel,
            rank,
            bankgroup,
            bank,
            row,
            column,
        }
    }

    /// Six fields in `channel, rank, bankgroup, bank, row, column` order, the same order
    /// `loc_mapping` declares bit-placement fields in.
    #[must_use]
    pub fn fields(&self) -> [u32; 6] {
        [
            self.channel,
            self.rank,
            self.bankgroup,
            self.bank,
            self.row,
            self.column,
        ]
    }

    #[must_use]
    pub fn from_fields(fields: [u32; 6]) -> Self {
        Self {
            channel: fields[0],
            rank: fields[1],
            bankgroup: fields[2],
            bank: fields[3],
            row: fields[4],
            column: fields[5],
        }
    }
}

/// DRAM command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Read,
    ReadPrecharge,
    Write,
    WritePrecharge,
    Activate,
    Precharge,
    Refresh,
    RefreshBank,
    SelfRefreshEnter,
    SelfRefreshExit,
}

impl CommandType {
    /// Parse the trace-file token spelling (`read`, `read_p`, `refresh_bank`, ...).
    pub fn from_trace_token(token: &str) -> Option<Self> {
        Some(match token {
            "read" => Self::Read,
            "read_p" => Self::ReadPrecharge,
            "write" => Self::Write,
            "write_p" => Self::WritePrecharge,
            "activate" => Self::Activate,
            "precharge" => Self::Precharge,
            "refresh_bank" => Self::RefreshBank,
            "refresh" => Self::Refresh,
            "self_refresh_enter" => Self::SelfRefreshEnter,
            "self_refresh_exit" => Self::SelfRefreshExit,
            _ => return None,
        })
    }
}

/// A timed DRAM command: opcode, target address, and the clock it was issued on.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    pub cmd_type: CommandType,
    pub addr: Address,
    pub clk_issued: u64,
}

impl Command {
    #[must_use]
    pub fn new(cmd_type: CommandType, addr: Address, clk_issued: u64) -> Self {
        Self {
            cmd_type,
            addr,
            clk_issued,
        }
    }
}

/// Memory topology family. Drives floorplan geometry and the device/case scaling
/// used by energy accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryType {
    Ddr,
    Hbm,
    Hmc,
}

impl MemoryType {
    #[must_use]
    pub fn is_3d_stacked(self) -> bool {
        matches!(self, Self::Hbm | Self::Hmc)
    }
}

/// Immutable configuration driving geometry, energy accounting, and output routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Topology
    pub memory_type: MemoryType,
    pub channels: u32,
    pub ranks: u32,
    pub bankgroups: u32,
    pub banks_per_group: u32,
    pub num_dies: u32,
    pub devices_per_rank: u32,

    // Geometry
    pub bank_asr: f64,
    pub num_x_grids: u32,
    pub num_y_grids: u32,
    pub mat_x: u32,
    pub mat_y: u32,
    pub row_tile: u32,
    pub tile_row_num: u32,
    pub bl: u32,
    pub device_width: u32,
    pub chip_x: f64,
    pub chip_y: f64,

    // Timing
    pub t_ck_ns: f64,
    pub power_epoch_period: u64,
    pub epoch_period: u64,
    pub burst_cycle: u64,

    // Energies (picojoules)
    pub act_energy_inc: f64,
    pub read_energy_inc: f64,
    pub write_energy_inc: f64,
    pub ref_energy_inc: f64,
    pub refb_energy_inc: f64,
    pub num_row_refresh: u32,
    pub rows: u32,

    // Thermal
    pub tamb0: f64,
    pub bank_order: u32,
    pub bank_layer_order: u32,
    pub loc_mapping: String,
    pub output_level: u32,

    // Background power model constants
    pub max_logic_power: f64,
    pub logic_const_bg_power: f64,

    // Output paths
    pub bank_position_csv: String,
    pub epoch_max_temp_file_csv: String,
    pub epoch_temperature_file_csv: String,
    pub final_temperature_file_csv: String,
}

/// Kelvin-to-Celsius offset used throughout the thermal maths.
pub const T0: f64 = 273.15;

/// Halo width (cells of zero-power padding on each side) required by the solver's boundary
/// stencil. `num_dummy / 2` cells are added per side.
pub const NUM_DUMMY: u32 = 2;

impl Config {
    #[must_use]
    pub fn banks(&self) -> u32 {
        self.bankgroups * self.banks_per_group
    }

    #[must_use]
    pub fn is_hmc(&self) -> bool {
        self.memory_type == MemoryType::Hmc
    }

    #[must_use]
    pub fn is_hbm(&self) -> bool {
        self.memory_type == MemoryType::Hbm
    }

    /// Ambient temperature in Kelvin (`Tamb0` is configured in Celsius).
    #[must_use]
    pub fn tamb_kelvin(&self) -> f64 {
        self.tamb0 + T0
    }
}

/// A minimal, internally-consistent [`Config`] for unit tests across this crate. Not a
/// reflection of any real part's datasheet values.
#[cfg(test)]
pub(crate) fn minimal_ddr_config() -> Config {
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
        bank_position_csv: "bank_position.csv".into(),
        epoch_max_temp_file_csv: "epoch_max_temp.csv".into(),
        epoch_temperature_file_csv: "epoch_temperature.csv".into(),
        final_temperature_file_csv: "final_temperature.csv".into(),
    }
}
