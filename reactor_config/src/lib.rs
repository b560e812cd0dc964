#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and CSV loaders for the bioreactor automations.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Pump calibration CSV (`pump,ml_per_sec,bias_ml`) backs the calibration gate.
//! - Readings CSV (`od,normalized_od,temperature`) drives replayed runs.
use serde::Deserialize;
use std::path::PathBuf;

pub mod calibration;
pub mod readings;

pub use calibration::{PumpCalibration, PumpCalibrations, load_pump_calibrations_csv};
pub use readings::{ReadingRow, load_readings_csv};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Bioreactor {
    /// Working volume of the vial in mL.
    pub max_volume_ml: f64,
}

impl Default for Bioreactor {
    fn default() -> Self {
        Self {
            max_volume_ml: 14.0,
        }
    }
}

/// What a controller does with its accumulated state when the setpoint moves.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SetpointPolicyCfg {
    #[default]
    Keep,
    Reset,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PidGainsCfg {
    #[serde(rename = "Kp", alias = "kp")]
    pub kp: f64,
    #[serde(rename = "Ki", alias = "ki", default)]
    pub ki: f64,
    #[serde(rename = "Kd", alias = "kd", default)]
    pub kd: f64,
    #[serde(default)]
    pub setpoint_policy: SetpointPolicyCfg,
}

impl PidGainsCfg {
    fn turbidostat_default() -> Self {
        Self {
            kp: 2.0,
            ki: 0.1,
            kd: 0.5,
            setpoint_policy: SetpointPolicyCfg::Keep,
        }
    }

    fn thermostat_default() -> Self {
        Self {
            kp: 3.0,
            ki: 0.0,
            kd: 4.5,
            setpoint_policy: SetpointPolicyCfg::Keep,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PidSection {
    /// Gains for `pid_turbidostat`.
    pub turbidostat: PidGainsCfg,
    /// Gains for temperature automations.
    pub thermostat: PidGainsCfg,
}

impl Default for PidSection {
    fn default() -> Self {
        Self {
            turbidostat: PidGainsCfg::turbidostat_default(),
            thermostat: PidGainsCfg::thermostat_default(),
        }
    }
}

fn default_duration_min() -> f64 {
    30.0
}

fn default_temperature_duration_min() -> f64 {
    1.5
}

fn default_light_duration_min() -> f64 {
    60.0
}

fn default_compensation_step_ml() -> f64 {
    0.1
}

fn default_naive_volume_ml() -> f64 {
    1.0
}

fn default_exchange_ml() -> f64 {
    0.75
}

fn default_max_exchanges() -> u32 {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct PidTurbidostatCfg {
    pub target_od: Option<f64>,
    pub target_normalized_od: Option<f64>,
    /// Cycle length in minutes.
    #[serde(default = "default_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdaptedTurbidostatCfg {
    pub volume: f64,
    pub min_od: Option<f64>,
    pub max_od: Option<f64>,
    pub min_normalized_od: Option<f64>,
    pub max_normalized_od: Option<f64>,
    #[serde(default = "default_compensation_step_ml")]
    pub compensation_step_ml: f64,
    #[serde(default = "default_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NaiveTurbidostatCfg {
    pub target_od: f64,
    #[serde(default = "default_naive_volume_ml")]
    pub volume: f64,
    #[serde(default = "default_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChemostatCfg {
    pub volume: f64,
    #[serde(default = "default_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChemostatWithInducerCfg {
    pub volume: f64,
    pub target_inducer_fraction: f64,
    #[serde(default = "default_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SwitchingDosingCfg {
    pub target_od: f64,
    #[serde(default = "default_exchange_ml")]
    pub exchange_ml: f64,
    #[serde(default = "default_max_exchanges")]
    pub max_exchanges: u32,
    #[serde(default = "default_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemperatureGradientCfg {
    pub start_temperature: f64,
    pub final_target_temperature: f64,
    /// Minutes to go from start to final.
    pub time_to_reach: f64,
    #[serde(default = "default_temperature_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RandomTemperatureCfg {
    pub min_temperature: f64,
    pub max_temperature: f64,
    /// Fixed RNG seed for a reproducible profile; drawn from entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_temperature_duration_min")]
    pub duration: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LightCycleCfg {
    pub max_light_intensity: f64,
    #[serde(default = "default_light_duration_min")]
    pub duration: f64,
}

/// The automation to run, tagged by `kind`.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutomationCfg {
    PidTurbidostat(PidTurbidostatCfg),
    AdaptedTurbidostat(AdaptedTurbidostatCfg),
    NaiveTurbidostat(NaiveTurbidostatCfg),
    Chemostat(ChemostatCfg),
    ChemostatWithInducer(ChemostatWithInducerCfg),
    SwitchingDosing(SwitchingDosingCfg),
    TemperatureGradient(TemperatureGradientCfg),
    RandomProfile(RandomTemperatureCfg),
    LightCycle(LightCycleCfg),
}

impl AutomationCfg {
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationCfg::PidTurbidostat(_) => "pid_turbidostat",
            AutomationCfg::AdaptedTurbidostat(_) => "adapted_turbidostat",
            AutomationCfg::NaiveTurbidostat(_) => "naive_turbidostat",
            AutomationCfg::Chemostat(_) => "chemostat",
            AutomationCfg::ChemostatWithInducer(_) => "chemostat_with_inducer",
            AutomationCfg::SwitchingDosing(_) => "switching_dosing",
            AutomationCfg::TemperatureGradient(_) => "temperature_gradient",
            AutomationCfg::RandomProfile(_) => "random_profile",
            AutomationCfg::LightCycle(_) => "light_cycle",
        }
    }

    /// Cycle length in minutes.
    pub fn duration_min(&self) -> f64 {
        match self {
            AutomationCfg::PidTurbidostat(c) => c.duration,
            AutomationCfg::AdaptedTurbidostat(c) => c.duration,
            AutomationCfg::NaiveTurbidostat(c) => c.duration,
            AutomationCfg::Chemostat(c) => c.duration,
            AutomationCfg::ChemostatWithInducer(c) => c.duration,
            AutomationCfg::SwitchingDosing(c) => c.duration,
            AutomationCfg::TemperatureGradient(c) => c.duration,
            AutomationCfg::RandomProfile(c) => c.duration,
            AutomationCfg::LightCycle(c) => c.duration,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Pump calibration CSV (`pump,ml_per_sec,bias_ml`).
    pub pumps: Option<PathBuf>,
}

/// Weight-verified dosing knobs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScaleCfg {
    /// Delay between scale polls while a pump runs.
    pub poll_ms: u64,
    /// Per-read timeout handed to the scale.
    pub read_timeout_ms: u64,
    /// Give up on a single transfer after this long.
    pub max_transfer_ms: u64,
    /// Consecutive failed reads tolerated before the transfer fails.
    pub max_read_retries: u32,
    /// First retry delay; doubles on every further failure.
    pub backoff_base_ms: u64,
}

impl Default for ScaleCfg {
    fn default() -> Self {
        Self {
            poll_ms: 50,
            read_timeout_ms: 500,
            max_transfer_ms: 120_000,
            max_read_retries: 5,
            backoff_base_ms: 20,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub bioreactor: Bioreactor,
    #[serde(default)]
    pub pid: PidSection,
    pub automation: AutomationCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub scale: ScaleCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn check_finite(name: &str, v: f64) -> eyre::Result<()> {
    if !v.is_finite() {
        eyre::bail!("{name} must be a finite number");
    }
    Ok(())
}

fn check_non_negative(name: &str, v: f64) -> eyre::Result<()> {
    check_finite(name, v)?;
    if v < 0.0 {
        eyre::bail!("{name} must be >= 0");
    }
    Ok(())
}

fn check_positive(name: &str, v: f64) -> eyre::Result<()> {
    check_finite(name, v)?;
    if v <= 0.0 {
        eyre::bail!("{name} must be > 0");
    }
    Ok(())
}

fn check_pair(min_name: &str, min: Option<f64>, max_name: &str, max: Option<f64>) -> eyre::Result<()> {
    match (min, max) {
        (None, None) => Ok(()),
        (Some(lo), Some(hi)) => {
            check_non_negative(min_name, lo)?;
            check_non_negative(max_name, hi)?;
            if lo >= hi {
                eyre::bail!("{min_name} must be < {max_name}");
            }
            Ok(())
        }
        _ => eyre::bail!("{min_name} and {max_name} must be given together"),
    }
}

fn check_gains(section: &str, g: &PidGainsCfg) -> eyre::Result<()> {
    check_finite(&format!("pid.{section}.Kp"), g.kp)?;
    check_finite(&format!("pid.{section}.Ki"), g.ki)?;
    check_finite(&format!("pid.{section}.Kd"), g.kd)?;
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Bioreactor
        check_positive("bioreactor.max_volume_ml", self.bioreactor.max_volume_ml)?;

        // PID
        check_gains("turbidostat", &self.pid.turbidostat)?;
        check_gains("thermostat", &self.pid.thermostat)?;

        // Automation
        check_positive("automation.duration", self.automation.duration_min())?;
        match &self.automation {
            AutomationCfg::PidTurbidostat(c) => {
                if let Some(t) = c.target_od {
                    check_non_negative("automation.target_od", t)?;
                }
                if let Some(t) = c.target_normalized_od {
                    check_non_negative("automation.target_normalized_od", t)?;
                }
            }
            AutomationCfg::AdaptedTurbidostat(c) => {
                check_non_negative("automation.volume", c.volume)?;
                check_non_negative("automation.compensation_step_ml", c.compensation_step_ml)?;
                check_pair("automation.min_od", c.min_od, "automation.max_od", c.max_od)?;
                check_pair(
                    "automation.min_normalized_od",
                    c.min_normalized_od,
                    "automation.max_normalized_od",
                    c.max_normalized_od,
                )?;
            }
            AutomationCfg::NaiveTurbidostat(c) => {
                check_non_negative("automation.target_od", c.target_od)?;
                check_non_negative("automation.volume", c.volume)?;
            }
            AutomationCfg::Chemostat(c) => {
                check_non_negative("automation.volume", c.volume)?;
            }
            AutomationCfg::ChemostatWithInducer(c) => {
                check_non_negative("automation.volume", c.volume)?;
                check_finite("automation.target_inducer_fraction", c.target_inducer_fraction)?;
                if !(0.0..1.0).contains(&c.target_inducer_fraction) {
                    eyre::bail!("automation.target_inducer_fraction must be in [0.0, 1.0)");
                }
            }
            AutomationCfg::SwitchingDosing(c) => {
                check_non_negative("automation.target_od", c.target_od)?;
                check_positive("automation.exchange_ml", c.exchange_ml)?;
                if c.max_exchanges == 0 {
                    eyre::bail!("automation.max_exchanges must be >= 1");
                }
            }
            AutomationCfg::TemperatureGradient(c) => {
                check_finite("automation.start_temperature", c.start_temperature)?;
                check_finite("automation.final_target_temperature", c.final_target_temperature)?;
                check_positive("automation.time_to_reach", c.time_to_reach)?;
            }
            AutomationCfg::RandomProfile(c) => {
                check_non_negative("automation.min_temperature", c.min_temperature)?;
                check_non_negative("automation.max_temperature", c.max_temperature)?;
                if c.min_temperature >= c.max_temperature {
                    eyre::bail!(
                        "automation.min_temperature must be below automation.max_temperature"
                    );
                }
            }
            AutomationCfg::LightCycle(c) => {
                check_non_negative("automation.max_light_intensity", c.max_light_intensity)?;
                if c.max_light_intensity > 100.0 {
                    eyre::bail!("automation.max_light_intensity must be <= 100");
                }
            }
        }

        // Scale
        if self.scale.poll_ms == 0 {
            eyre::bail!("scale.poll_ms must be >= 1");
        }
        if self.scale.read_timeout_ms == 0 {
            eyre::bail!("scale.read_timeout_ms must be >= 1");
        }
        if self.scale.max_transfer_ms == 0 {
            eyre::bail!("scale.max_transfer_ms must be >= 1");
        }
        if self.scale.max_transfer_ms > 24 * 60 * 60 * 1000 {
            eyre::bail!("scale.max_transfer_ms is unreasonably large (>24h)");
        }
        if self.scale.max_read_retries > 20 {
            eyre::bail!("scale.max_read_retries must be <= 20");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
