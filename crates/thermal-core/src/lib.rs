//! # thermal-core
//!
//! Cycle-level thermal-power accounting for 3D-layered DRAM.
//!
//! `thermal-core` turns a stream of issued DRAM commands into a power map, then into a
//! temperature field, the way a cycle-accurate memory simulator's thermal model does: every
//! command deposits its switching energy into the grid cell(s) its physical address resolves
//! to, background/standby/refresh/logic power tops the grid up between commands, and a
//! pluggable solver turns accumulated power into temperature at epoch boundaries and once more
//! at the end of the run.
//!
//! ## Quick start
//!
//! ```no_run
//! use thermal_core::{BackgroundStatsSource, Config, ThermalCalculator};
//!
//! struct NoBackground;
//! impl BackgroundStatsSource for NoBackground {
//!     fn sref_energy(&self, _c: u32, _r: u32) -> f64 { 0.0 }
//!     fn pre_stb_energy(&self, _c: u32, _r: u32) -> f64 { 0.0 }
//!     fn act_stb_energy(&self, _c: u32, _r: u32) -> f64 { 0.0 }
//!     fn pre_pd_energy(&self, _c: u32, _r: u32) -> f64 { 0.0 }
//!     fn epoch_read_commands(&self) -> u64 { 0 }
//!     fn epoch_write_commands(&self) -> u64 { 0 }
//! }
//!
//! # fn run(config: Config, solver: impl thermal_core::ThermalSolver) -> thermal_core::Result<()> {
//! let stats = NoBackground;
//! let mut calc = ThermalCalculator::new(config, &stats, solver)?;
//! // calc.update_power(&cmd, clk, &stats)?; for every issued command
//! calc.finalize(final_clk(), &stats)?;
//! # Ok(())
//! # }
//! # fn final_clk() -> u64 { 0 }
//! ```
//!
//! ## Architecture
//!
//! Command → [`remap`] (address bit reshuffle) → [`geometry`] (logical → grid coordinates) →
//! [`gridmap`] (energy deposit) → [`powermap`] (accumulated grid) → [`background`] (standby/
//! refresh/logic top-up) → [`solver`] (temperature) → [`output`] (CSV sinks).
//!
//! [`thermal::ThermalCalculator`] is the facade wiring all of the above into the two operations
//! a caller needs: [`thermal::ThermalCalculator::update_power`] per command, and
//! [`thermal::ThermalCalculator::finalize`] once at the end of a run.

pub mod background;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gridmap;
pub mod output;
pub mod powermap;
pub mod remap;
pub mod solver;
pub mod stats;
pub mod thermal;

pub use background::BackgroundPower;
pub use config::{Address, Command, CommandType, Config, MemoryType, NUM_DUMMY, T0};
pub use error::{Result, ThermalError};
pub use geometry::FloorplanGeometry;
pub use output::OutputWriter;
pub use powermap::PowerMaps;
pub use remap::AddressRemapper;
pub use solver::{HaloGrid, ThermalSolver};
pub use stats::BackgroundStatsSource;
pub use thermal::ThermalCalculator;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
