//! `thermal-cli run` — replay a trace file through `ThermalCalculator` and emit its CSVs.
//!
//! Grounded on `ThermalReplay::Run`/`ThermalReplay::ThermalReplay`'s constructor in the
//! original source: read the whole trace into memory once, replay it `num_repeats` times with
//! the clock continuing to advance across repeats, then call the final solve.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::{error, info};
use serde::Serialize;
use thermal_core::{Config, MemoryType, ThermalCalculator, ThermalError};
use thermal_solver::ReferenceSolver;

use crate::config_file::{self, PowerConstants};
use crate::stats::ReplayStats;
use crate::trace;

/// Parsed CLI arguments for the replay harness, independent of how `clap` collects them.
pub struct RunOptions {
    pub config_file: PathBuf,
    pub trace_file: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub num_repeats: u64,
    pub memory_type: Option<MemoryType>,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    config: &'a Config,
    trace_file: String,
    num_repeats: u64,
    total_commands_processed: u64,
    final_max_temperature_kelvin_per_case: Vec<f64>,
}

/// Run the replay harness end to end: load config, load trace, replay `num_repeats` times,
/// finalize, and (if `output_dir` was given) write `run_summary.json` alongside the CSVs.
///
/// # Errors
///
/// Returns [`ThermalError::Io`] if the config/trace files or any output path can't be read or
/// written, [`ThermalError::Config`]/[`ThermalError::Trace`] on malformed input, or whatever
/// [`ThermalCalculator`] itself reports.
pub fn run(opts: RunOptions) -> Result<(), ThermalError> {
    let config_text = fs::read_to_string(&opts.config_file)?;
    let (mut config, power_constants) = config_file::parse_config(&config_text, opts.memory_type)?;

    if let Some(dir) = &opts.output_dir {
        fs::create_dir_all(dir)?;
        redirect_output_paths(&mut config, dir);
    }

    let trace_text = fs::read_to_string(&opts.trace_file)?;
    let commands = trace::parse_trace(&trace_text)?;
    info!("loaded {} trace lines from {:?}", commands.len(), opts.trace_file);

    let mut stats = ReplayStats::new(&config, power_constants);
    let solver = ReferenceSolver;
    let mut calc = ThermalCalculator::new(config.clone(), &stats, solver)?;

    let mut clk_base = 0u64;
    let mut total_commands = 0u64;
    for repeat in 0..opts.num_repeats {
        let mut clk_offset = 0u64;
        for (offset, cmd) in &commands {
            clk_offset = *offset;
            let clk = clk_base + clk_offset;
            stats.process_cmd(cmd, clk);
            calc.update_power(cmd, clk, &stats)?;
            total_commands += 1;
        }
        clk_base += clk_offset;
        stats.reset_bank_active();
        info!("repeat {}/{} done, clk now {clk_base}", repeat + 1, opts.num_repeats);
    }

    calc.finalize(clk_base, &stats)?;
    info!("finalized at clk={clk_base}, {total_commands} commands processed over {} repeats", opts.num_repeats);

    if let Some(dir) = &opts.output_dir {
        write_run_summary(dir, &config, &opts, total_commands)?;
    }

    Ok(())
}

fn redirect_output_paths(config: &mut Config, dir: &Path) {
    config.bank_position_csv = join_filename(dir, &config.bank_position_csv);
    config.epoch_max_temp_file_csv = join_filename(dir, &config.epoch_max_temp_file_csv);
    config.epoch_temperature_file_csv = join_filename(dir, &config.epoch_temperature_file_csv);
    config.final_temperature_file_csv = join_filename(dir, &config.final_temperature_file_csv);
}

fn join_filename(dir: &Path, configured: &str) -> String {
    let name = Path::new(configured)
        .file_name()
        .map_or_else(|| configured.to_string(), |n| n.to_string_lossy().into_owned());
    dir.join(name).to_string_lossy().into_owned()
}

fn write_run_summary(
    dir: &Path,
    config: &Config,
    opts: &RunOptions,
    total_commands: u64,
) -> Result<(), ThermalError> {
    let final_max = max_temperature_per_case(&config.final_temperature_file_csv)?;
    let summary = RunSummary {
        config,
        trace_file: opts.trace_file.to_string_lossy().into_owned(),
        num_repeats: opts.num_repeats,
        total_commands_processed: total_commands,
        final_max_temperature_kelvin_per_case: final_max,
    };
    let path = dir.join("run_summary.json");
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| ThermalError::config(format!("serializing run summary: {e}")))?;
    fs::write(&path, json)?;
    info!("wrote {path:?}");
    Ok(())
}

/// Re-read the final-temperature CSV this same run just wrote and reduce it to one max
/// temperature per case, purely for the summary; nothing else in this crate reads it back.
fn max_temperature_per_case(path: &str) -> Result<Vec<f64>, ThermalError> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut header = String::new();
    reader.read_line(&mut header)?;

    let mut max_by_case: HashMap<usize, f64> = HashMap::new();
    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split(',');
        let Some(case_id) = fields.next().and_then(|s| s.parse::<usize>().ok()) else {
            continue;
        };
        let Some(temp) = fields.next_back().and_then(|s| s.parse::<f64>().ok()) else {
            continue;
        };
        max_by_case
            .entry(case_id)
            .and_modify(|m| *m = m.max(temp))
            .or_insert(temp);
    }

    let num_case = max_by_case.keys().copied().max().map_or(0, |m| m + 1);
    Ok((0..num_case).map(|c| max_by_case.get(&c).copied().unwrap_or(0.0)).collect())
}

/// Log `err` at `error!` the way `main` does before exiting with status 1, matching the
/// original's `AbruptExit`/`exit(1)` behavior at the process boundary.
pub fn report_fatal(err: &ThermalError) {
    error!("{err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn join_filename_keeps_only_the_basename() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            join_filename(dir, "some/where/bank_position.csv"),
            "/tmp/out/bank_position.csv"
        );
    }

    #[test]
    fn max_temperature_per_case_picks_the_highest_row_per_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("final.csv");
        fs::write(
            &path,
            "rank_channel_index,x,y,z,power,temperature\n\
             0,0,0,0,0.1,300.0\n\
             0,1,0,0,0.1,310.5\n\
             1,0,0,0,0.2,295.0\n",
        )
        .unwrap();

        let max = max_temperature_per_case(path.to_str().unwrap()).unwrap();
        assert_eq!(max.len(), 2);
        assert!((max[0] - 310.5).abs() < 1e-9);
        assert!((max[1] - 295.0).abs() < 1e-9);
    }

    #[test]
    fn end_to_end_run_writes_csvs_and_summary() {
        let dir = tempdir().unwrap();

        let config_path = dir.path().join("config.txt");
        fs::write(
            &config_path,
            "memory_type = ddr\n\
             channels = 1\n\
             ranks = 1\n\
             bankgroups = 1\n\
             banks_per_group = 4\n\
             num_x_grids = 8\n\
             num_y_grids = 8\n\
             mat_x = 4\n\
             mat_y = 4\n\
             tile_row_num = 128\n\
             bl = 8\n\
             chip_x = 0.01\n\
             chip_y = 0.01\n\
             t_ck_ns = 1.0\n\
             power_epoch_period = 100\n\
             rows = 128\n\
             read_energy_inc = 1000.0\n\
             write_energy_inc = 1000.0\n",
        )
        .unwrap();

        let trace_path = dir.path().join("trace.txt");
        fs::write(
            &trace_path,
            "0 activate 0 0 0 0 0 0\n\
             10 read 0 0 0 0 0 0\n\
             200 write 0 0 0 0 0 1\n",
        )
        .unwrap();

        let output_dir = dir.path().join("out");
        let opts = RunOptions {
            config_file: config_path,
            trace_file: trace_path.clone(),
            output_dir: Some(output_dir.clone()),
            num_repeats: 2,
            memory_type: None,
        };

        run(opts).unwrap();

        assert!(output_dir.join("bank_position.csv").exists());
        assert!(output_dir.join("epoch_max_temp.csv").exists());
        assert!(output_dir.join("final_temperature.csv").exists());

        let summary_text = fs::read_to_string(output_dir.join("run_summary.json")).unwrap();
        let summary: serde_json::Value = serde_json::from_str(&summary_text).unwrap();
        assert_eq!(summary["total_commands_processed"], 6);
        assert_eq!(summary["num_repeats"], 2);
    }
}
