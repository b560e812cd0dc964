use reactor_traits::Heater;

use super::{Automation, Cycle, check_duration, set_duration};
use crate::error::{ReactorError, Result};
use crate::event::{DecisionEvent, EventKind};
use crate::hw_error::to_report;
use crate::pid::{Gains, OutputLimits, SetpointPolicy};
use crate::ramp::{RampConfig, RampStep, RampedSetpointController};
use crate::readings::SignalKind;
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

/// Duty-cycle delta bounds per correction, in percentage points.
pub const DELTA_DC_LIMITS: OutputLimits = OutputLimits::new(-25.0, 25.0);

#[derive(Debug, Clone)]
pub struct TemperatureGradientParams {
    pub ramp: RampConfig,
    pub gains: Gains,
    pub setpoint_policy: SetpointPolicy,
    pub duration_min: f64,
}

/// Heater automation that walks the target temperature from a start value
/// to a final one over `time_to_reach` minutes.
#[derive(Debug)]
pub struct TemperatureGradient {
    ramp: RampedSetpointController,
    duration_min: f64,
    latest_temperature: Option<f64>,
}

const SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("final_target_temperature", "°C"),
    PublishedSetting::float("start_temperature", "°C"),
    PublishedSetting::float("time_to_reach", "min"),
    PublishedSetting::float("duration", "min"),
];

impl TemperatureGradient {
    pub fn new(params: TemperatureGradientParams) -> Result<Self> {
        check_duration(params.duration_min)?;
        let ramp = RampedSetpointController::new(
            params.ramp,
            params.gains,
            DELTA_DC_LIMITS,
            params.setpoint_policy,
        )?;
        Ok(Self {
            ramp,
            duration_min: params.duration_min,
            latest_temperature: None,
        })
    }

    pub fn ramp(&self) -> &RampedSetpointController {
        &self.ramp
    }

    fn apply(heater: &mut dyn Heater, step: RampStep) -> Result<DecisionEvent> {
        let current_dc = heater.apply_delta(step.applied_delta).map_err(to_report)?;
        tracing::info!(
            current_dc,
            delta_dc = step.applied_delta,
            target = step.target,
            "heater updated"
        );
        Ok(DecisionEvent::new(
            EventKind::UpdatedHeaterDc,
            format!("delta_dc={:.2}", step.applied_delta),
        )
        .with("current_dc", current_dc)
        .with("delta_dc", step.applied_delta)
        .with("target_temperature", step.target))
    }

    /// Jump the target temperature, clamped to the ceiling.
    ///
    /// With `update_now`, and when the heater is free and a temperature has
    /// been seen, the duty cycle is corrected right away. The correction is
    /// damped by how soon the next scheduled cycle runs.
    pub fn set_target_temperature(
        &mut self,
        value: f64,
        update_now: Option<(&mut dyn Heater, Option<f64>)>,
    ) -> Result<Option<DecisionEvent>> {
        let immediate = match (update_now, self.latest_temperature) {
            (Some((heater, time_to_next_run_min)), Some(latest)) if !heater.is_locked() => {
                let damping = time_to_next_run_min.map(|t| t / self.duration_min);
                Some((heater, latest, damping))
            }
            _ => None,
        };
        match immediate {
            Some((heater, latest, damping)) => {
                let step = self.ramp.set_target(value, Some((latest, damping)))?;
                match step {
                    Some(step) => Self::apply(heater, step).map(Some),
                    None => Ok(None),
                }
            }
            None => {
                self.ramp.set_target(value, None)?;
                Ok(None)
            }
        }
    }
}

impl Automation for TemperatureGradient {
    type Actuator = dyn Heater;

    fn name(&self) -> &'static str {
        "temperature_gradient"
    }

    fn published_settings(&self) -> &'static [PublishedSetting] {
        SETTINGS
    }

    fn decide(
        &mut self,
        cycle: &Cycle,
        heater: &mut Self::Actuator,
    ) -> Result<Option<DecisionEvent>> {
        let latest = cycle.readings.require(SignalKind::Temperature)?;
        self.latest_temperature = Some(latest);
        self.ramp.advance(cycle.elapsed_min)?;
        if heater.is_locked() {
            tracing::debug!("heater PWM locked by another job; skipping cycle");
            return Ok(None);
        }
        let step = self.ramp.correction(latest, None)?;
        Self::apply(heater, step).map(Some)
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(SETTINGS, name)?;
        match name {
            "final_target_temperature" => self.ramp.set_final_target(value.as_float(name)?)?,
            "start_temperature" => self.ramp.set_start(value.as_float(name)?)?,
            "time_to_reach" => self.ramp.set_time_to_reach(value.as_float(name)?)?,
            "duration" => return set_duration(&mut self.duration_min, value),
            other => return Err(eyre::Report::new(ReactorError::UnknownSetting(other.into()))),
        }
        Ok(SettingUpdate::Applied)
    }
}
