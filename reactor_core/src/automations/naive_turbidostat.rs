use reactor_traits::{ActuationExecutor, DoseVolumes};

use super::{Automation, Cycle, check_duration, dose, set_duration};
use crate::error::{Result, invalid_input, invalid_value};
use crate::event::{DecisionEvent, EventKind};
use crate::readings::SignalKind;
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

#[derive(Debug, Clone)]
pub struct NaiveTurbidostatParams {
    pub target_od: f64,
    pub volume_ml: f64,
    pub duration_min: f64,
}

/// Exchange a fixed volume whenever OD is above target.
#[derive(Debug)]
pub struct NaiveTurbidostat {
    target_od: f64,
    volume_ml: f64,
    duration_min: f64,
}

const SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("target_od", "AU"),
    PublishedSetting::float("volume", "mL"),
    PublishedSetting::float("duration", "min"),
];

impl NaiveTurbidostat {
    pub fn new(params: NaiveTurbidostatParams) -> Result<Self> {
        if !params.target_od.is_finite() || params.target_od < 0.0 {
            return Err(invalid_value("target_od", params.target_od));
        }
        if !params.volume_ml.is_finite() || params.volume_ml < 0.0 {
            return Err(invalid_value("volume", params.volume_ml));
        }
        check_duration(params.duration_min)?;
        Ok(Self {
            target_od: params.target_od,
            volume_ml: params.volume_ml,
            duration_min: params.duration_min,
        })
    }
}

impl Automation for NaiveTurbidostat {
    type Actuator = dyn ActuationExecutor;

    fn name(&self) -> &'static str {
        "naive_turbidostat"
    }

    fn published_settings(&self) -> &'static [PublishedSetting] {
        SETTINGS
    }

    fn decide(
        &mut self,
        cycle: &Cycle,
        executor: &mut Self::Actuator,
    ) -> Result<Option<DecisionEvent>> {
        let latest = cycle.readings.require(SignalKind::Od)?;
        if latest <= self.target_od {
            return Ok(None);
        }
        let moved = dose(executor, DoseVolumes::exchange_media(self.volume_ml), &cycle.stop)?;
        Ok(Some(
            DecisionEvent::new(
                EventKind::DilutionEvent,
                format!(
                    "Latest OD = {latest:.2} > Target OD = {:.2}; cycled {:.2} mL",
                    self.target_od, moved.media_ml
                ),
            )
            .with("latest_od", latest)
            .with("target_od", self.target_od)
            .with("volume", moved.media_ml),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(SETTINGS, name)?;
        if name == "duration" {
            return set_duration(&mut self.duration_min, value);
        }
        let v = value.as_float(name)?;
        if v < 0.0 {
            return Err(invalid_input(format!("{name} must be >= 0, got {v}")));
        }
        match name {
            "target_od" => self.target_od = v,
            _ => self.volume_ml = v,
        }
        Ok(SettingUpdate::Applied)
    }
}
