use reactor_traits::{ActuationExecutor, CalibrationGate, DoseVolumes, Pump};

use super::{Automation, Cycle, check_duration, dose, require_calibration, set_duration};
use crate::error::{Result, invalid_input, invalid_value};
use crate::event::{DecisionEvent, EventKind};
use crate::mixture::compute_exchange_volume;
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

fn check_volume(volume_ml: f64) -> Result<()> {
    if !volume_ml.is_finite() || volume_ml < 0.0 {
        return Err(invalid_value("volume", volume_ml));
    }
    Ok(())
}

fn set_volume(volume: &mut f64, value: SettingValue) -> Result<SettingUpdate> {
    let v = value.as_float("volume")?;
    if v < 0.0 {
        return Err(invalid_input(format!("volume must be >= 0, got {v}")));
    }
    *volume = v;
    Ok(SettingUpdate::Applied)
}

#[derive(Debug, Clone)]
pub struct ChemostatParams {
    pub volume_ml: f64,
    pub duration_min: f64,
}

/// Exchange a fixed volume every cycle.
///
/// The event reports the waste actually removed, which a weight-verified
/// executor measures rather than assumes.
#[derive(Debug)]
pub struct Chemostat {
    volume_ml: f64,
    duration_min: f64,
}

const CHEMOSTAT_SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("volume", "mL"),
    PublishedSetting::float("duration", "min"),
];

impl Chemostat {
    pub fn new(params: ChemostatParams, gate: &dyn CalibrationGate) -> Result<Self> {
        require_calibration(gate, &[Pump::Media, Pump::Waste])?;
        check_volume(params.volume_ml)?;
        check_duration(params.duration_min)?;
        Ok(Self {
            volume_ml: params.volume_ml,
            duration_min: params.duration_min,
        })
    }
}

impl Automation for Chemostat {
    type Actuator = dyn ActuationExecutor;

    fn name(&self) -> &'static str {
        "chemostat"
    }

    fn published_settings(&self) -> &'static [PublishedSetting] {
        CHEMOSTAT_SETTINGS
    }

    fn decide(
        &mut self,
        cycle: &Cycle,
        executor: &mut Self::Actuator,
    ) -> Result<Option<DecisionEvent>> {
        let moved = dose(executor, DoseVolumes::exchange_media(self.volume_ml), &cycle.stop)?;
        Ok(Some(
            DecisionEvent::new(
                EventKind::DilutionEvent,
                format!("exchanged {:.2} mL", moved.waste_ml),
            )
            .with("volume_actually_cycled", moved.waste_ml),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(CHEMOSTAT_SETTINGS, name)?;
        match name {
            "volume" => set_volume(&mut self.volume_ml, value),
            _ => set_duration(&mut self.duration_min, value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChemostatWithInducerParams {
    pub volume_ml: f64,
    pub target_inducer_fraction: f64,
    pub duration_min: f64,
}

/// Chemostat that tops the inducer (alt media) back up to a fixed fraction
/// after every media exchange.
#[derive(Debug)]
pub struct ChemostatWithInducer {
    volume_ml: f64,
    target_fraction: f64,
    duration_min: f64,
}

const INDUCER_SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("volume", "mL"),
    PublishedSetting::float("target_inducer_fraction", "%"),
    PublishedSetting::float("duration", "min"),
];

impl ChemostatWithInducer {
    pub fn new(params: ChemostatWithInducerParams, gate: &dyn CalibrationGate) -> Result<Self> {
        require_calibration(gate, &[Pump::Media, Pump::Waste, Pump::AltMedia])?;
        check_volume(params.volume_ml)?;
        let f = params.target_inducer_fraction;
        if !f.is_finite() || !(0.0..1.0).contains(&f) {
            return Err(invalid_value("target_inducer_fraction", f));
        }
        check_duration(params.duration_min)?;
        Ok(Self {
            volume_ml: params.volume_ml,
            target_fraction: f,
            duration_min: params.duration_min,
        })
    }

    pub fn target_fraction(&self) -> f64 {
        self.target_fraction
    }
}

impl Automation for ChemostatWithInducer {
    type Actuator = dyn ActuationExecutor;

    fn name(&self) -> &'static str {
        "chemostat_with_inducer"
    }

    fn published_settings(&self) -> &'static [PublishedSetting] {
        INDUCER_SETTINGS
    }

    fn decide(
        &mut self,
        cycle: &Cycle,
        executor: &mut Self::Actuator,
    ) -> Result<Option<DecisionEvent>> {
        let media = dose(executor, DoseVolumes::exchange_media(self.volume_ml), &cycle.stop)?;
        // The media exchange diluted the inducer; read back where it landed.
        let fraction = executor.alt_media_fraction();
        let top_up =
            compute_exchange_volume(self.target_fraction, fraction, executor.vial_volume_ml())?;
        let alt = if top_up > 0.0 {
            dose(executor, DoseVolumes::exchange_alt_media(top_up), &cycle.stop)?
        } else {
            DoseVolumes::default()
        };
        Ok(Some(
            DecisionEvent::new(
                EventKind::DilutionEvent,
                format!(
                    "exchanged {:.2} mL of media and {:.2} mL of alt media",
                    media.media_ml, alt.alt_media_ml
                ),
            )
            .with("media_ml", media.media_ml)
            .with("alt_media_ml", alt.alt_media_ml)
            .with("alt_media_fraction", executor.alt_media_fraction()),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(INDUCER_SETTINGS, name)?;
        match name {
            "volume" => set_volume(&mut self.volume_ml, value),
            "target_inducer_fraction" => {
                let v = value.as_float(name)?;
                if !(0.0..1.0).contains(&v) {
                    return Err(invalid_input(format!(
                        "target_inducer_fraction must be in [0, 1), got {v}"
                    )));
                }
                self.target_fraction = v;
                Ok(SettingUpdate::Applied)
            }
            _ => set_duration(&mut self.duration_min, value),
        }
    }
}
