//! `reactor`: validate a bioreactor configuration, inspect its automation,
//! and replay recorded readings against simulated actuators.

mod cli;
mod error_fmt;
mod simulate;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use eyre::{Result, WrapErr, eyre};
use reactor_config::{Config, Logging, PumpCalibrations, load_pump_calibrations_csv, load_toml};
use reactor_core::{ConfiguredAutomation, build_automation};
use reactor_traits::StopFlag;
use serde_json::json;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::simulate::SimulateArgs;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> Result<()> {
    color_eyre::install()?;

    let cfg = read_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging)?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", cli.config.display()))?;

    let stop = StopFlag::new();
    let handler_flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.request_stop()) {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
    }

    let calibrations = load_calibrations(&cli, &cfg)?;
    let automation = build_automation(&cfg, &calibrations)?;

    match cli.cmd {
        Commands::Check => {
            print_check(&automation, calibrations.len(), cli.json);
            Ok(())
        }
        Commands::Settings => {
            print_settings(&automation, cli.json);
            Ok(())
        }
        Commands::Simulate {
            readings,
            cycles,
            time_to_next_run,
            set,
            weighed,
        } => {
            let args = SimulateArgs {
                readings,
                cycles,
                time_to_next_run,
                set,
                weighed,
            };
            simulate::run(&cfg, automation, &args, &stop, cli.json)
        }
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)
        .map_err(|e| eyre!("read config {}: {e}", path.display()))?;
    load_toml(&text).map_err(|e: toml::de::Error| {
        let at = e
            .span()
            .map(|s| format!(" at byte {}", s.start))
            .unwrap_or_default();
        eyre!("parse config {}{at}: {}", path.display(), e.message())
    })
}

/// `--calibration` wins over `[calibration] pumps`; a relative config path is
/// resolved next to the config file.
fn load_calibrations(cli: &Cli, cfg: &Config) -> Result<PumpCalibrations> {
    let path: Option<PathBuf> = match (&cli.calibration, &cfg.calibration.pumps) {
        (Some(p), _) => Some(p.clone()),
        (None, Some(p)) if p.is_relative() => Some(
            cli.config
                .parent()
                .map_or_else(|| p.clone(), |dir| dir.join(p)),
        ),
        (None, Some(p)) => Some(p.clone()),
        (None, None) => None,
    };
    match path {
        Some(p) => {
            let cals = load_pump_calibrations_csv(&p)?;
            tracing::info!(path = %p.display(), pumps = cals.len(), "pump calibrations loaded");
            Ok(cals)
        }
        None => {
            tracing::warn!("no pump calibration CSV configured; dosing automations will refuse to start");
            Ok(PumpCalibrations::new())
        }
    }
}

fn init_tracing(cli: &Cli, logging: &Logging) -> Result<()> {
    use tracing_subscriber::{
        EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    // RUST_LOG takes precedence over --log-level.
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .wrap_err_with(|| format!("invalid --log-level '{}'", cli.log_level))?;
    let console = if cli.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![console];

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre!("logging.file '{file}' has no file name"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "never" => tracing_appender::rolling::never(dir, name),
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            other => eyre::bail!("logging.rotation must be never|daily|hourly, got '{other}'"),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let level = logging.level.as_deref().unwrap_or("info");
        let file_filter = EnvFilter::try_new(level)
            .wrap_err_with(|| format!("invalid logging.level '{level}'"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("install tracing subscriber")
}

fn print_check(automation: &ConfiguredAutomation, calibrated_pumps: usize, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "automation": automation.name(),
                "calibrated_pumps": calibrated_pumps,
            })
        );
    } else {
        println!(
            "OK: {} ready ({calibrated_pumps} calibrated pumps)",
            automation.name()
        );
    }
}

fn print_settings(automation: &ConfiguredAutomation, json: bool) {
    let settings = automation.published_settings();
    if json {
        let rows: Vec<_> = settings
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "datatype": s.datatype.as_str(),
                    "unit": s.unit,
                    "settable": s.settable,
                })
            })
            .collect();
        println!("{}", json!({ "automation": automation.name(), "settings": rows }));
        return;
    }
    println!("{}:", automation.name());
    for s in settings {
        let access = if s.settable { "rw" } else { "ro" };
        println!(
            "  {:<28} {:<6} {:<4} {}",
            s.name,
            s.datatype.as_str(),
            access,
            s.unit.unwrap_or("")
        );
    }
}
