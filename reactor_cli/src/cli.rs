//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "reactor", version, about = "Bioreactor automation CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/reactor_config.toml")]
    pub config: PathBuf,

    /// Pump calibration CSV (pump,ml_per_sec,bias_ml); overrides [calibration] pumps
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print events and errors as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate config and calibration, then construct the automation
    Check,
    /// List the configured automation's published settings
    Settings,
    /// Replay recorded readings against a simulated reactor
    Simulate {
        /// Readings CSV (any of od,normalized_od,temperature)
        #[arg(long, value_name = "FILE")]
        readings: PathBuf,
        /// Stop after this many cycles
        #[arg(long, value_name = "N")]
        cycles: Option<usize>,
        /// Minutes until the next scheduled run, forwarded to each decision
        #[arg(long = "time-to-next-run", value_name = "MIN")]
        time_to_next_run: Option<f64>,
        /// Apply a runtime setting before the first cycle (repeatable)
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
        /// Verify every dose on a simulated scale instead of the ideal vial
        #[arg(long, action = ArgAction::SetTrue)]
        weighed: bool,
    },
}
