use reactor_traits::{LedChannel, LedDriver};

use super::{Automation, Cycle, check_duration};
use crate::error::{Result, invalid_input, invalid_value};
use crate::event::{DecisionEvent, EventKind};
use crate::hw_error::to_report;
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

const CHANNELS: [LedChannel; 2] = [LedChannel::B, LedChannel::C];

fn logistic(t: f64, k: f64, midpoint: f64) -> f64 {
    1.0 / (1.0 + (-k * (t - midpoint)).exp())
}

/// Relative light level (0..=1) at `hours` into a 24 h day.
///
/// Dawn is centred on hour 5 and dusk on hour 21; the curve switches from
/// the rising to the falling logistic at hour 16.
pub fn light_at(hours: f64) -> f64 {
    let t = hours.rem_euclid(24.0);
    if t < 16.0 {
        logistic(t, 1.5, 5.0)
    } else {
        logistic(t, -1.5, 21.0)
    }
}

#[derive(Debug, Clone)]
pub struct LightCycleParams {
    pub max_light_intensity: f64,
    pub duration_min: f64,
}

/// Smooth day/night light cycle on LED channels B and C.
#[derive(Debug)]
pub struct LightCycle {
    max_intensity: f64,
    hours_online: f64,
}

const SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("duration", "min").read_only(),
    PublishedSetting::float("max_light_intensity", "%"),
];

impl LightCycle {
    pub fn new(params: LightCycleParams) -> Result<Self> {
        let m = params.max_light_intensity;
        if !m.is_finite() || !(0.0..=100.0).contains(&m) {
            return Err(invalid_value("max_light_intensity", m));
        }
        check_duration(params.duration_min)?;
        Ok(Self {
            max_intensity: m,
            hours_online: 0.0,
        })
    }

    pub fn hours_online(&self) -> f64 {
        self.hours_online
    }
}

impl Automation for LightCycle {
    type Actuator = dyn LedDriver;

    fn name(&self) -> &'static str {
        "light_cycle"
    }

    fn published_settings(&self) -> &'static [PublishedSetting] {
        SETTINGS
    }

    fn decide(
        &mut self,
        cycle: &Cycle,
        leds: &mut Self::Actuator,
    ) -> Result<Option<DecisionEvent>> {
        let intensity = self.max_intensity * light_at(self.hours_online);
        for channel in CHANNELS {
            leds.set_intensity(channel, intensity).map_err(to_report)?;
        }
        tracing::debug!(hours = self.hours_online, intensity, "light level set");
        self.hours_online += cycle.elapsed_min / 60.0;
        Ok(Some(
            DecisionEvent::new(
                EventKind::ChangedLedIntensity,
                format!("Changed intensity to {intensity:.2}%"),
            )
            .with("intensity", intensity),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(SETTINGS, name)?;
        let v = value.as_float(name)?;
        if !(0.0..=100.0).contains(&v) {
            return Err(invalid_input(format!(
                "max_light_intensity must be in [0, 100], got {v}"
            )));
        }
        self.max_intensity = v;
        Ok(SettingUpdate::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_dark_at_night_and_bright_at_midday() {
        assert!(light_at(0.0) < 0.001);
        assert!((light_at(5.0) - 0.5).abs() < 1e-12);
        assert!(light_at(12.0) > 0.99);
        assert!((light_at(21.0) - 0.5).abs() < 1e-12);
        assert_eq!(light_at(36.0), light_at(12.0));
    }
}
