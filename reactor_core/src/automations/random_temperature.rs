use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reactor_traits::Heater;

use super::temperature_gradient::DELTA_DC_LIMITS;
use super::{Automation, Cycle, check_duration, ignored, set_duration};
use crate::error::{BuildError, ReactorError, Result, invalid_value};
use crate::event::{DecisionEvent, EventKind};
use crate::hw_error::to_report;
use crate::pid::{FeedbackController, Gains, SetpointPolicy};
use crate::ramp::DEFAULT_CEILING;
use crate::readings::SignalKind;
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

#[derive(Debug, Clone)]
pub struct RandomTemperatureParams {
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub gains: Gains,
    pub setpoint_policy: SetpointPolicy,
    pub duration_min: f64,
}

/// Heater automation that draws a fresh target temperature uniformly from
/// `[min, max)` every cycle and steers the heater toward it.
#[derive(Debug)]
pub struct RandomTemperature<R = StdRng> {
    pid: FeedbackController,
    min_temperature: f64,
    max_temperature: f64,
    duration_min: f64,
    rng: R,
}

const SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("Min_Temperature", "°C"),
    PublishedSetting::float("Max_Temperature", "°C"),
    PublishedSetting::float("duration", "min"),
];

fn check_range(min: f64, max: f64) -> Result<()> {
    for (field, v) in [("Min_Temperature", min), ("Max_Temperature", max)] {
        if !v.is_finite() || !(0.0..=DEFAULT_CEILING).contains(&v) {
            return Err(invalid_value(field, v));
        }
    }
    if min >= max {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "Min_Temperature must be below Max_Temperature",
        )));
    }
    Ok(())
}

impl RandomTemperature<StdRng> {
    pub fn new(params: RandomTemperatureParams) -> Result<Self> {
        Self::with_rng(params, StdRng::from_entropy())
    }

    /// Reproducible target sequence.
    pub fn seeded(params: RandomTemperatureParams, seed: u64) -> Result<Self> {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomTemperature<R> {
    pub fn with_rng(params: RandomTemperatureParams, rng: R) -> Result<Self> {
        check_duration(params.duration_min)?;
        check_range(params.min_temperature, params.max_temperature)?;
        let midpoint = (params.min_temperature + params.max_temperature) / 2.0;
        let pid = FeedbackController::new(params.gains, midpoint, DELTA_DC_LIMITS)?
            .with_policy(params.setpoint_policy);
        Ok(Self {
            pid,
            min_temperature: params.min_temperature,
            max_temperature: params.max_temperature,
            duration_min: params.duration_min,
            rng,
        })
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min_temperature, self.max_temperature)
    }

    pub fn controller(&self) -> &FeedbackController {
        &self.pid
    }

    fn set_bound(
        &mut self,
        name: &str,
        value: SettingValue,
        is_max: bool,
    ) -> Result<SettingUpdate> {
        let v = value.as_float(name)?;
        let (min, max) = if is_max {
            (self.min_temperature, v)
        } else {
            (v, self.max_temperature)
        };
        match check_range(min, max) {
            Ok(()) => {
                self.min_temperature = min;
                self.max_temperature = max;
                Ok(SettingUpdate::Applied)
            }
            Err(e) => Ok(ignored(name, &e.to_string())),
        }
    }
}

impl<R: Rng + 'static> Automation for RandomTemperature<R> {
    type Actuator = dyn Heater;

    fn name(&self) -> &'static str {
        "random_profile"
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
        if heater.is_locked() {
            tracing::debug!("heater PWM locked by another job; skipping cycle");
            return Ok(None);
        }
        let target = self.rng.gen_range(self.min_temperature..self.max_temperature);
        self.pid.set_setpoint(target)?;
        let delta = self.pid.update(latest, 1.0)?;
        let current_dc = heater.apply_delta(delta).map_err(to_report)?;
        tracing::info!(current_dc, delta_dc = delta, target, "heater updated");
        Ok(Some(
            DecisionEvent::new(EventKind::UpdatedHeaterDc, format!("delta_dc={delta:.2}"))
                .with("current_dc", current_dc)
                .with("delta_dc", delta)
                .with("target_temperature", target),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(SETTINGS, name)?;
        match name {
            "Min_Temperature" => self.set_bound(name, value, false),
            "Max_Temperature" => self.set_bound(name, value, true),
            "duration" => set_duration(&mut self.duration_min, value),
            other => Err(eyre::Report::new(ReactorError::UnknownSetting(other.into()))),
        }
    }
}
