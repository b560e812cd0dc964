use reactor_traits::{ActuationExecutor, CalibrationGate, Pump};

use super::{Automation, Cycle, check_duration, require_calibration, set_duration};
use crate::error::{Result, invalid_input, invalid_value};
use crate::event::{DecisionEvent, EventKind};
use crate::mixture::{Liquid, SwitchingConfig, SwitchingDoser};
use crate::readings::SignalKind;
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

#[derive(Debug, Clone)]
pub struct SwitchingDosingParams {
    pub target_od: f64,
    pub switching: SwitchingConfig,
    pub duration_min: f64,
}

/// Grow on media until OD reaches target, then replace the vial contents
/// with alt media; next time the target is reached, switch back.
#[derive(Debug)]
pub struct SwitchingDosing {
    target_od: f64,
    doser: SwitchingDoser,
    duration_min: f64,
}

const SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("target_od", "AU"),
    PublishedSetting::float("duration", "min"),
];

impl SwitchingDosing {
    pub fn new(params: SwitchingDosingParams, gate: &dyn CalibrationGate) -> Result<Self> {
        require_calibration(gate, &[Pump::Media, Pump::Waste, Pump::AltMedia])?;
        if !params.target_od.is_finite() || params.target_od < 0.0 {
            return Err(invalid_value("target_od", params.target_od));
        }
        check_duration(params.duration_min)?;
        Ok(Self {
            target_od: params.target_od,
            doser: SwitchingDoser::new(params.switching)?,
            duration_min: params.duration_min,
        })
    }

    pub fn liquid(&self) -> Liquid {
        self.doser.liquid()
    }
}

impl Automation for SwitchingDosing {
    type Actuator = dyn ActuationExecutor;

    fn name(&self) -> &'static str {
        "switching_dosing"
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
        if latest < self.target_od {
            return Ok(None);
        }
        let outcome = self.doser.switch(executor, &cycle.stop)?;
        let (what, ml) = match outcome.liquid {
            Liquid::Secondary => ("alt-media", outcome.moved.alt_media_ml),
            Liquid::Primary => ("media", outcome.moved.media_ml),
        };
        let message = if outcome.completed {
            format!(
                "Replaced until alt_media_fraction={:.2}, dosed {ml:.2} mL {what} in {} exchanges",
                outcome.fraction, outcome.exchanges
            )
        } else {
            format!(
                "Stopped after {} exchanges at alt_media_fraction={:.2}",
                outcome.exchanges, outcome.fraction
            )
        };
        Ok(Some(
            DecisionEvent::new(EventKind::DilutionEvent, message)
                .with("latest_od", latest)
                .with("target_od", self.target_od)
                .with("media_ml", outcome.moved.media_ml)
                .with("alt_media_ml", outcome.moved.alt_media_ml)
                .with("alt_media_fraction", outcome.fraction),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(SETTINGS, name)?;
        match name {
            "target_od" => {
                let v = value.as_float(name)?;
                if v < 0.0 {
                    return Err(invalid_input(format!("target_od must be >= 0, got {v}")));
                }
                self.target_od = v;
                Ok(SettingUpdate::Applied)
            }
            _ => set_duration(&mut self.duration_min, value),
        }
    }
}
