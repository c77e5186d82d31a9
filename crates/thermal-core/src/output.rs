//! CSV output sinks: bank floorplan positions, per-epoch max-temperature preview,
//! full per-epoch temperature grid (optional), and final steady-state temperature grid.
//!
//! Column layouts mirror `PrintCSV_bank`/`PrintCSVHeader_final`/`PrintCSV_trans`/`PrintCSV_final`;
//! the `BufWriter` + best-effort-flush-on-`Drop` pattern matches `session.rs::SessionWriter` so a
//! panic or early exit doesn't lose whatever was already written.

use std::fs::File;
use std::io::{BufWriter, Write};

use crate::config::Config;
use crate::error::Result;
use crate::geometry::FloorplanGeometry;

/// Owns the four CSV sinks a run produces. Bank positions are written once, at construction;
/// the rest are written incrementally as epochs complete and once more at finalization.
pub struct OutputWriter {
    bank_position: BufWriter<File>,
    epoch_max_temp: BufWriter<File>,
    epoch_temperature: Option<BufWriter<File>>,
    final_temperature: BufWriter<File>,
    finished: bool,
}

impl OutputWriter {
    /// Open all configured CSV paths, write their headers, and write the bank-position table
    /// (which never changes after construction).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ThermalError::Io`] if any output path cannot be created.
    pub fn new(config: &Config, geometry: &FloorplanGeometry) -> Result<Self> {
        let mut final_temperature = BufWriter::new(File::create(&config.final_temperature_file_csv)?);
        writeln!(final_temperature, "rank_channel_index,x,y,z,power,temperature")?;

        let mut bank_position = BufWriter::new(File::create(&config.bank_position_csv)?);
        write_bank_positions(&mut bank_position, config, geometry)?;

        let mut epoch_max_temp = BufWriter::new(File::create(&config.epoch_max_temp_file_csv)?);
        writeln!(epoch_max_temp, "layer, power, max_temp, epoch_time")?;

        let epoch_temperature = if config.output_level >= 2 {
            let mut w = BufWriter::new(File::create(&config.epoch_temperature_file_csv)?);
            writeln!(w, "rank_channel_index,x,y,z,power,temperature,epoch")?;
            Some(w)
        } else {
            None
        };

        Ok(Self {
            bank_position,
            epoch_max_temp,
            epoch_temperature,
            final_temperature,
            finished: false,
        })
    }

    /// Record one layer's max temperature preview for the epoch that just closed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ThermalError::Io`] on a write failure.
    pub fn write_epoch_max_temp(&mut self, layer: u32, max_temp_celsius: f64, epoch_ms: f64) -> Result<()> {
        writeln!(self.epoch_max_temp, "{layer},-,{max_temp_celsius},{epoch_ms}")?;
        Ok(())
    }

    /// Record one grid cell's transient power/temperature for the epoch that just closed.
    /// A no-op if `output_level < 2` (the sink wasn't opened).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ThermalError::Io`] on a write failure.
    #[allow(clippy::too_many_arguments)]
    pub fn write_epoch_temperature(
        &mut self,
        case_id: usize,
        x: u32,
        y: u32,
        layer: u32,
        power: f64,
        temperature_celsius: f64,
        epoch: u64,
    ) -> Result<()> {
        if let Some(w) = &mut self.epoch_temperature {
            writeln!(w, "{case_id},{x},{y},{layer},{power},{temperature_celsius},{epoch}")?;
        }
        Ok(())
    }

    /// Record one grid cell's final power/temperature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ThermalError::Io`] on a write failure.
    pub fn write_final_temperature(
        &mut self,
        case_id: usize,
        x: u32,
        y: u32,
        layer: u32,
        power: f64,
        temperature_kelvin: f64,
    ) -> Result<()> {
        writeln!(
            self.final_temperature,
            "{case_id},{x},{y},{layer},{power},{temperature_kelvin}"
        )?;
        Ok(())
    }

    fn flush_all(&mut self) -> std::io::Result<()> {
        self.bank_position.flush()?;
        self.epoch_max_temp.flush()?;
        if let Some(w) = &mut self.epoch_temperature {
            w.flush()?;
        }
        self.final_temperature.flush()?;
        Ok(())
    }

    /// Flush and close every sink. Call this once, after the final temperature has been
    /// written for every case.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ThermalError::Io`] on a flush failure.
    pub fn finish(mut self) -> Result<()> {
        self.flush_all()?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let _ = self.flush_all();
    }
}

fn write_bank_positions(
    w: &mut BufWriter<File>,
    config: &Config,
    geometry: &FloorplanGeometry,
) -> Result<()> {
    writeln!(w, "vault_id,bank_id,start_x,end_x,start_y,end_y,z")?;
    for vault_id in 0..config.channels {
        let (vault_id_x, vault_id_y) = geometry.map_to_vault(config, vault_id);
        for bg in 0..config.bankgroups {
            for bank in 0..config.banks_per_group {
                let abs_bank_id = bg * config.banks_per_group + bank;
                let z = geometry.map_to_z(config, vault_id, abs_bank_id);
                let (bank_id_x, bank_id_y) = geometry.map_to_bank(config, bg, bank);

                let bank_offset_x = (geometry.bank_x * config.num_x_grids) as i32;
                let start_x = vault_id_x * bank_offset_x + bank_id_x * config.num_x_grids as i32;
                let end_x = vault_id_x * bank_offset_x
                    + (bank_id_x + 1) * config.num_x_grids as i32
                    - 1;

                let bank_offset_y = (geometry.bank_y * config.num_y_grids) as i32;
                let start_y = vault_id_y * bank_offset_y + bank_id_y * config.num_y_grids as i32;
                let end_y = vault_id_y * bank_offset_y
                    + (bank_id_y + 1) * config.num_y_grids as i32
                    - 1;

                writeln!(
                    w,
                    "{vault_id},{abs_bank_id},{start_x},{end_x},{start_y},{end_y},{z}"
                )?;
            }
        }
    }
    Ok(())
}
