//! `From` implementations and the config-driven constructor bridging
//! `reactor_config` types to `reactor_core` types.

use reactor_config::{AutomationCfg, Config, PidGainsCfg, ReadingRow, SetpointPolicyCfg};
use reactor_traits::{ActuationExecutor, CalibrationGate, Heater, LedDriver};

use crate::automations::{
    AdaptedTurbidostat, AdaptedTurbidostatParams, Automation, Chemostat, ChemostatParams,
    ChemostatWithInducer, ChemostatWithInducerParams, LightCycle, LightCycleParams,
    NaiveTurbidostat, NaiveTurbidostatParams, PidTurbidostat, PidTurbidostatParams,
    RandomTemperature, RandomTemperatureParams, SwitchingDosing, SwitchingDosingParams,
    TemperatureGradient, TemperatureGradientParams,
};
use crate::error::Result;
use crate::mixture::SwitchingConfig;
use crate::pid::{Gains, SetpointPolicy};
use crate::ramp::RampConfig;
use crate::readings::Readings;
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue};

// ── PID ──────────────────────────────────────────────────────────────────────

impl From<&PidGainsCfg> for Gains {
    fn from(c: &PidGainsCfg) -> Self {
        Self::new(c.kp, c.ki, c.kd)
    }
}

impl From<SetpointPolicyCfg> for SetpointPolicy {
    fn from(c: SetpointPolicyCfg) -> Self {
        match c {
            SetpointPolicyCfg::Keep => SetpointPolicy::KeepState,
            SetpointPolicyCfg::Reset => SetpointPolicy::ResetState,
        }
    }
}

// ── Readings ─────────────────────────────────────────────────────────────────

impl From<&ReadingRow> for Readings {
    fn from(row: &ReadingRow) -> Self {
        let mut r = Readings::default();
        if let Some(v) = row.od {
            r = r.with_od(v);
        }
        if let Some(v) = row.normalized_od {
            r = r.with_normalized_od(v);
        }
        if let Some(v) = row.temperature {
            r = r.with_temperature(v);
        }
        r
    }
}

// ── Automation params ────────────────────────────────────────────────────────

impl From<&reactor_config::AdaptedTurbidostatCfg> for AdaptedTurbidostatParams {
    fn from(c: &reactor_config::AdaptedTurbidostatCfg) -> Self {
        Self {
            volume_ml: c.volume,
            min_od: c.min_od,
            max_od: c.max_od,
            min_normalized_od: c.min_normalized_od,
            max_normalized_od: c.max_normalized_od,
            compensation_step_ml: c.compensation_step_ml,
            duration_min: c.duration,
        }
    }
}

impl From<&reactor_config::NaiveTurbidostatCfg> for NaiveTurbidostatParams {
    fn from(c: &reactor_config::NaiveTurbidostatCfg) -> Self {
        Self {
            target_od: c.target_od,
            volume_ml: c.volume,
            duration_min: c.duration,
        }
    }
}

impl From<&reactor_config::ChemostatCfg> for ChemostatParams {
    fn from(c: &reactor_config::ChemostatCfg) -> Self {
        Self {
            volume_ml: c.volume,
            duration_min: c.duration,
        }
    }
}

impl From<&reactor_config::ChemostatWithInducerCfg> for ChemostatWithInducerParams {
    fn from(c: &reactor_config::ChemostatWithInducerCfg) -> Self {
        Self {
            volume_ml: c.volume,
            target_inducer_fraction: c.target_inducer_fraction,
            duration_min: c.duration,
        }
    }
}

impl From<&reactor_config::SwitchingDosingCfg> for SwitchingDosingParams {
    fn from(c: &reactor_config::SwitchingDosingCfg) -> Self {
        Self {
            target_od: c.target_od,
            switching: SwitchingConfig {
                exchange_ml: c.exchange_ml,
                max_exchanges: c.max_exchanges,
                ..SwitchingConfig::default()
            },
            duration_min: c.duration,
        }
    }
}

impl From<&reactor_config::LightCycleCfg> for LightCycleParams {
    fn from(c: &reactor_config::LightCycleCfg) -> Self {
        Self {
            max_light_intensity: c.max_light_intensity,
            duration_min: c.duration,
        }
    }
}

// ── Configured automation ────────────────────────────────────────────────────

pub type DosingAutomation = dyn Automation<Actuator = dyn ActuationExecutor + 'static>;
pub type HeaterAutomation = dyn Automation<Actuator = dyn Heater + 'static>;
pub type LedAutomation = dyn Automation<Actuator = dyn LedDriver + 'static>;

/// An automation built from config, grouped by the actuator it drives.
pub enum ConfiguredAutomation {
    Dosing(Box<DosingAutomation>),
    Heater(Box<HeaterAutomation>),
    Led(Box<LedAutomation>),
}

impl core::fmt::Debug for ConfiguredAutomation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let group = match self {
            ConfiguredAutomation::Dosing(_) => "Dosing",
            ConfiguredAutomation::Heater(_) => "Heater",
            ConfiguredAutomation::Led(_) => "Led",
        };
        f.debug_tuple(group).field(&self.name()).finish()
    }
}

impl ConfiguredAutomation {
    pub fn name(&self) -> &'static str {
        match self {
            ConfiguredAutomation::Dosing(a) => a.name(),
            ConfiguredAutomation::Heater(a) => a.name(),
            ConfiguredAutomation::Led(a) => a.name(),
        }
    }

    pub fn published_settings(&self) -> &'static [PublishedSetting] {
        match self {
            ConfiguredAutomation::Dosing(a) => a.published_settings(),
            ConfiguredAutomation::Heater(a) => a.published_settings(),
            ConfiguredAutomation::Led(a) => a.published_settings(),
        }
    }

    pub fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        match self {
            ConfiguredAutomation::Dosing(a) => a.apply_setting(name, value),
            ConfiguredAutomation::Heater(a) => a.apply_setting(name, value),
            ConfiguredAutomation::Led(a) => a.apply_setting(name, value),
        }
    }
}

/// Construct the automation named by `cfg.automation`.
///
/// Dosing automations check `gate` for the pumps they drive; the resulting
/// `BuildError` names the first pump missing a calibration.
pub fn build_automation(
    cfg: &Config,
    gate: &dyn CalibrationGate,
) -> Result<ConfiguredAutomation> {
    let automation = match &cfg.automation {
        AutomationCfg::PidTurbidostat(c) => {
            let params = PidTurbidostatParams {
                target_od: c.target_od,
                target_normalized_od: c.target_normalized_od,
                duration_min: c.duration,
                gains: Gains::from(&cfg.pid.turbidostat),
                setpoint_policy: cfg.pid.turbidostat.setpoint_policy.into(),
                vial_volume_ml: cfg.bioreactor.max_volume_ml,
            };
            ConfiguredAutomation::Dosing(Box::new(PidTurbidostat::new(params, gate)?))
        }
        AutomationCfg::AdaptedTurbidostat(c) => {
            ConfiguredAutomation::Dosing(Box::new(AdaptedTurbidostat::new(c.into(), gate)?))
        }
        AutomationCfg::NaiveTurbidostat(c) => {
            ConfiguredAutomation::Dosing(Box::new(NaiveTurbidostat::new(c.into())?))
        }
        AutomationCfg::Chemostat(c) => {
            ConfiguredAutomation::Dosing(Box::new(Chemostat::new(c.into(), gate)?))
        }
        AutomationCfg::ChemostatWithInducer(c) => {
            ConfiguredAutomation::Dosing(Box::new(ChemostatWithInducer::new(c.into(), gate)?))
        }
        AutomationCfg::SwitchingDosing(c) => {
            ConfiguredAutomation::Dosing(Box::new(SwitchingDosing::new(c.into(), gate)?))
        }
        AutomationCfg::TemperatureGradient(c) => {
            let params = TemperatureGradientParams {
                ramp: RampConfig::new(
                    c.start_temperature,
                    c.final_target_temperature,
                    c.time_to_reach,
                ),
                gains: Gains::from(&cfg.pid.thermostat),
                setpoint_policy: cfg.pid.thermostat.setpoint_policy.into(),
                duration_min: c.duration,
            };
            ConfiguredAutomation::Heater(Box::new(TemperatureGradient::new(params)?))
        }
        AutomationCfg::RandomProfile(c) => {
            let params = RandomTemperatureParams {
                min_temperature: c.min_temperature,
                max_temperature: c.max_temperature,
                gains: Gains::from(&cfg.pid.thermostat),
                setpoint_policy: cfg.pid.thermostat.setpoint_policy.into(),
                duration_min: c.duration,
            };
            let automation = match c.seed {
                Some(seed) => RandomTemperature::seeded(params, seed)?,
                None => RandomTemperature::new(params)?,
            };
            ConfiguredAutomation::Heater(Box::new(automation))
        }
        AutomationCfg::LightCycle(c) => {
            ConfiguredAutomation::Led(Box::new(LightCycle::new(c.into())?))
        }
    };
    tracing::info!(automation = automation.name(), "automation constructed");
    Ok(automation)
}
