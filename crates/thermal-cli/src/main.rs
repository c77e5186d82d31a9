//! CLI replay harness for `thermal-core`: drives a command trace through `ThermalCalculator`
//! and writes its CSV outputs.

mod commands;
mod config_file;
mod stats;
mod trace;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use commands::run::{self, RunOptions};

#[derive(Parser)]
#[command(name = "thermal-cli")]
#[command(about = "Cycle-level DRAM thermal-power replay harness")]
#[command(version = thermal_core::VERSION)]
struct Cli {
    /// The config file
    #[arg(short = 'c', long = "config-file")]
    config_file: PathBuf,

    /// The trace file
    #[arg(short = 't', long = "trace-file")]
    trace_file: PathBuf,

    /// Output directory for stats files
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Number of repeats
    #[arg(short = 'r', long = "num-repeats", default_value_t = 10)]
    num_repeats: u64,

    /// Type of memory system - default, hmc, ideal
    #[arg(long = "memory-type", default_value = "default", value_parser = ["default", "hmc", "ideal"])]
    memory_type: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let memory_type = if cli.memory_type == "default" {
        None
    } else {
        Some(config_file::memory_type_from_cli_flag(&cli.memory_type))
    };

    let opts = RunOptions {
        config_file: cli.config_file,
        trace_file: cli.trace_file,
        output_dir: cli.output_dir,
        num_repeats: cli.num_repeats,
        memory_type,
    };

    match run::run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            run::report_fatal(&e);
            ExitCode::FAILURE
        }
    }
}
