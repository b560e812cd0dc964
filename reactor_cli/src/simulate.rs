//! `reactor simulate`: replay recorded readings against simulated actuators.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, WrapErr, eyre};
use reactor_config::{Config, ScaleCfg, load_readings_csv};
use reactor_core::{
    ConfiguredAutomation, DecisionEvent, EventSink, Readings, RunOptions, RunSummary,
    SettingUpdate, SettingValue, run_cycles,
};
use reactor_hardware::{
    SimulatedHeater, SimulatedLeds, SimulatedRig, SimulatedVial, WeightSettings,
    WeightVerifiedExecutor,
};
use reactor_traits::{ActuationExecutor, DoseVolumes, Heater, LedChannel, ManualClock, StopFlag};
use serde_json::{Map, Value, json};

/// Grams the simulated balance moves per poll while a pump runs.
const RIG_GRAMS_PER_READ: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub readings: PathBuf,
    pub cycles: Option<usize>,
    pub time_to_next_run: Option<f64>,
    pub set: Vec<String>,
    pub weighed: bool,
}

pub fn weight_settings(cfg: &ScaleCfg) -> WeightSettings {
    WeightSettings {
        poll: Duration::from_millis(cfg.poll_ms),
        read_timeout: Duration::from_millis(cfg.read_timeout_ms),
        max_transfer: Duration::from_millis(cfg.max_transfer_ms),
        max_read_retries: cfg.max_read_retries,
        backoff_base: Duration::from_millis(cfg.backoff_base_ms),
    }
}

/// Parse a `NAME=VALUE` pair from `--set`.
pub fn parse_setting(arg: &str) -> Result<(&str, SettingValue)> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| eyre!("--set expects NAME=VALUE, got '{arg}'"))?;
    let value = value.parse::<SettingValue>()?;
    Ok((name.trim(), value))
}

/// Prints each event on stdout, pretty or as one JSON object per line.
struct PrintSink {
    json: bool,
}

impl EventSink for PrintSink {
    fn emit(&mut self, event: &DecisionEvent) {
        if self.json {
            let data: Map<String, Value> = event
                .fields()
                .iter()
                .map(|(k, v)| ((*k).to_string(), json!(v)))
                .collect();
            println!(
                "{}",
                json!({ "event": event.kind().as_str(), "message": event.message(), "data": data })
            );
        } else {
            let fields = event
                .fields()
                .iter()
                .map(|(k, v)| format!("{k}={v:.4}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{event} [{fields}]");
        }
    }
}

pub fn run(
    cfg: &Config,
    mut automation: ConfiguredAutomation,
    args: &SimulateArgs,
    stop: &StopFlag,
    json: bool,
) -> Result<()> {
    for arg in &args.set {
        let (name, value) = parse_setting(arg)?;
        match automation.apply_setting(name, value)? {
            SettingUpdate::Applied => tracing::info!(setting = name, %value, "setting applied"),
            SettingUpdate::Ignored => tracing::warn!(setting = name, %value, "setting ignored"),
        }
    }

    let readings: Vec<Readings> = load_readings_csv(&args.readings)?
        .iter()
        .map(Readings::from)
        .collect();
    let opts = RunOptions {
        cycle_min: cfg.automation.duration_min(),
        time_to_next_run_min: args.time_to_next_run,
        max_cycles: args.cycles,
    };
    tracing::info!(
        automation = automation.name(),
        rows = readings.len(),
        cycle_min = opts.cycle_min,
        "simulation starting"
    );

    let mut sink = PrintSink { json };
    let vial_ml = cfg.bioreactor.max_volume_ml;
    let (summary, state) = match &mut automation {
        ConfiguredAutomation::Dosing(dosing) if args.weighed => {
            let rig = SimulatedRig::new(vial_ml, RIG_GRAMS_PER_READ);
            let mut exec = WeightVerifiedExecutor::with_clock(
                rig.scale(),
                rig.pumps(),
                ManualClock::new(),
                vial_ml,
                weight_settings(&cfg.scale),
            );
            let actuator: &mut (dyn ActuationExecutor + 'static) = &mut exec;
            let summary = run_cycles(&mut **dosing, actuator, readings, &mut sink, stop, opts)
                .wrap_err("weighed simulation")?;
            let state = dosing_state(&exec.ledger().totals(), exec.alt_media_fraction());
            (summary, state)
        }
        ConfiguredAutomation::Dosing(dosing) => {
            let mut vial = SimulatedVial::new(vial_ml);
            let actuator: &mut (dyn ActuationExecutor + 'static) = &mut vial;
            let summary = run_cycles(&mut **dosing, actuator, readings, &mut sink, stop, opts)?;
            let state = dosing_state(&vial.totals(), vial.alt_media_fraction());
            (summary, state)
        }
        ConfiguredAutomation::Heater(gradient) => {
            let mut heater = SimulatedHeater::new(0.0);
            let actuator: &mut (dyn Heater + 'static) = &mut heater;
            let summary = run_cycles(&mut **gradient, actuator, readings, &mut sink, stop, opts)?;
            (summary, json!({ "duty_cycle": heater.duty_cycle() }))
        }
        ConfiguredAutomation::Led(light) => {
            let mut leds = SimulatedLeds::new();
            let actuator: &mut (dyn reactor_traits::LedDriver + 'static) = &mut leds;
            let summary = run_cycles(&mut **light, actuator, readings, &mut sink, stop, opts)?;
            let state = json!({
                "led_b": leds.intensity(LedChannel::B),
                "led_c": leds.intensity(LedChannel::C),
            });
            (summary, state)
        }
    };

    print_summary(&summary, &state, json);
    Ok(())
}

fn dosing_state(totals: &DoseVolumes, alt_media_fraction: f64) -> Value {
    json!({
        "media_ml": totals.media_ml,
        "alt_media_ml": totals.alt_media_ml,
        "waste_ml": totals.waste_ml,
        "alt_media_fraction": alt_media_fraction,
    })
}

fn print_summary(summary: &RunSummary, state: &Value, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "summary": {
                    "cycles": summary.cycles,
                    "events": summary.events,
                    "errors": summary.errors,
                    "state": state,
                }
            })
        );
        return;
    }
    println!(
        "simulation complete: cycles={} events={} errors={}",
        summary.cycles, summary.events, summary.errors
    );
    if let Value::Object(entries) = state {
        for (k, v) in entries {
            println!("  {k}: {v}");
        }
    }
}
