//! `key = value` config-file reader.
//!
//! Grounded on the `Config` field list read by the original `ThermalCalculator` constructor.
//! Whitespace/`=`-delimited text, one assignment per line, `#` comments and blank lines
//! ignored; no third-party INI crate, since nothing reaches for one here.

use std::collections::HashMap;

use log::warn;
use thermal_core::{Config, MemoryType, ThermalError};

/// Background-power constants [`crate::stats::ReplayStats`] needs that aren't part of
/// [`Config`] proper (the core has no opinion on how background energy is derived from
/// bank-active-state bookkeeping; that's a CLI-side reference-implementation detail).
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerConstants {
    pub sref_power_mw: f64,
    pub pre_stb_power_mw: f64,
    pub act_stb_power_mw: f64,
    pub pre_pd_power_mw: f64,
}

/// Parse a config file's text into a [`Config`] plus the CLI-only [`PowerConstants`].
///
/// # Errors
///
/// Returns [`ThermalError::Config`] if a required key is missing or a value doesn't parse as
/// the type that key expects.
pub fn parse_config(text: &str, memory_type_override: Option<MemoryType>) -> Result<(Config, PowerConstants), ThermalError> {
    let mut raw: HashMap<String, String> = HashMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ThermalError::config(format!(
                "line {}: expected `key = value`, got {line:?}",
                lineno + 1
            )));
        };
        raw.insert(key.trim().to_string(), value.trim().to_string());
    }

    let memory_type = match memory_type_override {
        Some(mt) => mt,
        None => parse_memory_type(raw.get("memory_type").map(String::as_str).unwrap_or("ddr"))?,
    };

    let config = Config {
        memory_type,
        channels: req_u32(&raw, "channels")?,
        ranks: req_u32(&raw, "ranks")?,
        bankgroups: req_u32(&raw, "bankgroups")?,
        banks_per_group: req_u32(&raw, "banks_per_group")?,
        num_dies: opt_u32(&raw, "num_dies", 1),
        devices_per_rank: opt_u32(&raw, "devices_per_rank", 1),
        bank_asr: opt_f64(&raw, "bank_asr", 1.0),
        num_x_grids: req_u32(&raw, "num_x_grids")?,
        num_y_grids: req_u32(&raw, "num_y_grids")?,
        mat_x: req_u32(&raw, "mat_x")?,
        mat_y: req_u32(&raw, "mat_y")?,
        row_tile: opt_u32(&raw, "row_tile", 1),
        tile_row_num: req_u32(&raw, "tile_row_num")?,
        bl: req_u32(&raw, "bl")?,
        device_width: opt_u32(&raw, "device_width", 1),
        chip_x: req_f64(&raw, "chip_x")?,
        chip_y: req_f64(&raw, "chip_y")?,
        t_ck_ns: req_f64(&raw, "t_ck_ns")?,
        power_epoch_period: req_u64(&raw, "power_epoch_period")?,
        epoch_period: opt_u64(&raw, "epoch_period", 1000),
        burst_cycle: opt_u64(&raw, "burst_cycle", 4),
        act_energy_inc: opt_f64(&raw, "act_energy_inc", 0.0),
        read_energy_inc: opt_f64(&raw, "read_energy_inc", 0.0),
        write_energy_inc: opt_f64(&raw, "write_energy_inc", 0.0),
        ref_energy_inc: opt_f64(&raw, "ref_energy_inc", 0.0),
        refb_energy_inc: opt_f64(&raw, "refb_energy_inc", 0.0),
        num_row_refresh: opt_u32(&raw, "num_row_refresh", 1),
        rows: req_u32(&raw, "rows")?,
        tamb0: opt_f64(&raw, "tamb0", 25.0),
        bank_order: opt_u32(&raw, "bank_order", 0),
        bank_layer_order: opt_u32(&raw, "bank_layer_order", 0),
        loc_mapping: raw.get("loc_mapping").cloned().unwrap_or_default(),
        output_level: opt_u32(&raw, "output_level", 1),
        max_logic_power: opt_f64(&raw, "max_logic_power", 0.0),
        logic_const_bg_power: opt_f64(&raw, "logic_const_bg_power", 0.0),
        bank_position_csv: raw
            .get("bank_position_csv")
            .cloned()
            .unwrap_or_else(|| "bank_position.csv".to_string()),
        epoch_max_temp_file_csv: raw
            .get("epoch_max_temp_file_csv")
            .cloned()
            .unwrap_or_else(|| "epoch_max_temp.csv".to_string()),
        epoch_temperature_file_csv: raw
            .get("epoch_temperature_file_csv")
            .cloned()
            .unwrap_or_else(|| "epoch_temperature.csv".to_string()),
        final_temperature_file_csv: raw
            .get("final_temperature_file_csv")
            .cloned()
            .unwrap_or_else(|| "final_temperature.csv".to_string()),
    };

    let power_constants = PowerConstants {
        sref_power_mw: opt_f64(&raw, "sref_power_mw", 0.0),
        pre_stb_power_mw: opt_f64(&raw, "pre_stb_power_mw", 0.0),
        act_stb_power_mw: opt_f64(&raw, "act_stb_power_mw", 0.0),
        pre_pd_power_mw: opt_f64(&raw, "pre_pd_power_mw", 0.0),
    };

    for key in raw.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            warn!("unknown config key {key:?}, ignoring");
        }
    }

    Ok((config, power_constants))
}

fn parse_memory_type(s: &str) -> Result<MemoryType, ThermalError> {
    match s.to_ascii_lowercase().as_str() {
        "ddr" => Ok(MemoryType::Ddr),
        "hbm" => Ok(MemoryType::Hbm),
        "hmc" => Ok(MemoryType::Hmc),
        other => Err(ThermalError::config(format!("unknown memory_type {other:?}"))),
    }
}

/// Maps the replay harness's `--memory-type {default|hmc|ideal}` CLI flag onto [`MemoryType`].
/// `ideal` is a reserved alias for a future lossless mode; it currently maps to `Ddr` with a
/// `warn` log, the same alternate-naming-path-through-one-constructor treatment the original
/// gives it.
#[must_use]
pub fn memory_type_from_cli_flag(flag: &str) -> MemoryType {
    match flag {
        "hmc" => MemoryType::Hmc,
        "ideal" => {
            warn!("--memory-type ideal is a reserved alias; using ddr");
            MemoryType::Ddr
        }
        _ => MemoryType::Ddr,
    }
}

fn req_u32(raw: &HashMap<String, String>, key: &str) -> Result<u32, ThermalError> {
    raw.get(key)
        .ok_or_else(|| ThermalError::config(format!("missing required key {key:?}")))?
        .parse()
        .map_err(|_| ThermalError::config(format!("key {key:?}: not a valid integer")))
}

fn req_u64(raw: &HashMap<String, String>, key: &str) -> Result<u64, ThermalError> {
    raw.get(key)
        .ok_or_else(|| ThermalError::config(format!("missing required key {key:?}")))?
        .parse()
        .map_err(|_| ThermalError::config(format!("key {key:?}: not a valid integer")))
}

fn req_f64(raw: &HashMap<String, String>, key: &str) -> Result<f64, ThermalError> {
    raw.get(key)
        .ok_or_else(|| ThermalError::config(format!("missing required key {key:?}")))?
        .parse()
        .map_err(|_| ThermalError::config(format!("key {key:?}: not a valid number")))
}

fn opt_u32(raw: &HashMap<String, String>, key: &str, default: u32) -> u32 {
    raw.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn opt_u64(raw: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    raw.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn opt_f64(raw: &HashMap<String, String>, key: &str, default: f64) -> f64 {
    raw.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

const KNOWN_KEYS: &[&str] = &[
    "memory_type",
    "channels",
    "ranks",
    "bankgroups",
    "banks_per_group",
    "num_dies",
    "devices_per_rank",
    "bank_asr",
    "num_x_grids",
    "num_y_grids",
    "mat_x",
    "mat_y",
    "row_tile",
    "tile_row_num",
    "bl",
    "device_width",
    "chip_x",
    "chip_y",
    "t_ck_ns",
    "power_epoch_period",
    "epoch_period",
    "burst_cycle",
    "act_energy_inc",
    "read_energy_inc",
    "write_energy_inc",
    "ref_energy_inc",
    "refb_energy_inc",
    "num_row_refresh",
    "rows",
    "tamb0",
    "bank_order",
    "bank_layer_order",
    "loc_mapping",
    "output_level",
    "max_logic_power",
    "logic_const_bg_power",
    "bank_position_csv",
    "epoch_max_temp_file_csv",
    "epoch_temperature_file_csv",
    "final_temperature_file_csv",
    "sref_power_mw",
    "pre_stb_power_mw",
    "act_stb_power_mw",
    "pre_pd_power_mw",
];

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
        # a comment
        memory_type = ddr
        channels = 1
        ranks = 1
        bankgroups = 1
        banks_per_group = 4
        num_x_grids = 16
        num_y_grids = 16
        mat_x = 4
        mat_y = 4
        tile_row_num = 128
        bl = 8
        chip_x = 0.01
        chip_y = 0.01
        t_ck_ns = 1.0
        power_epoch_period = 1000
        rows = 128
    ";

    #[test]
    fn parses_required_and_defaulted_fields() {
        let (cfg, _) = parse_config(SAMPLE, None).unwrap();
        assert_eq!(cfg.channels, 1);
        assert_eq!(cfg.memory_type, MemoryType::Ddr);
        assert_eq!(cfg.device_width, 1);
        assert!((cfg.tamb0 - 25.0).abs() < 1e-9);
    }

    #[test]
    fn missing_required_key_is_a_config_error() {
        let text = "channels = 1\n";
        let err = parse_config(text, None).unwrap_err();
        assert!(matches!(err, ThermalError::Config(_)));
    }

    #[test]
    fn cli_memory_type_override_wins_over_file_value() {
        let (cfg, _) = parse_config(SAMPLE, Some(MemoryType::Hmc)).unwrap();
        assert_eq!(cfg.memory_type, MemoryType::Hmc);
    }

    #[test]
    fn ideal_flag_maps_to_ddr() {
        assert_eq!(memory_type_from_cli_flag("ideal"), MemoryType::Ddr);
        assert_eq!(memory_type_from_cli_flag("hmc"), MemoryType::Hmc);
        assert_eq!(memory_type_from_cli_flag("default"), MemoryType::Ddr);
    }
}
