use reactor_traits::{ActuationExecutor, CalibrationGate, DoseVolumes, Pump};

use super::{
    Automation, Cycle, OdSignal, check_duration, dose, ignored, pick_target, require_calibration,
    set_duration,
};
use crate::error::{BuildError, Result};
use crate::event::{DecisionEvent, EventKind};
use crate::hysteresis::{DEFAULT_COMPENSATION_STEP_ML, HysteresisDecision, HysteresisDoser};
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

#[derive(Debug, Clone)]
pub struct AdaptedTurbidostatParams {
    pub volume_ml: f64,
    pub min_od: Option<f64>,
    pub max_od: Option<f64>,
    pub min_normalized_od: Option<f64>,
    pub max_normalized_od: Option<f64>,
    pub compensation_step_ml: f64,
    pub duration_min: f64,
}

impl AdaptedTurbidostatParams {
    /// Raw-OD thresholds with default compensation and a 30 min cycle.
    pub fn raw(min: f64, max: f64, volume_ml: f64) -> Self {
        Self {
            volume_ml,
            min_od: Some(min),
            max_od: Some(max),
            min_normalized_od: None,
            max_normalized_od: None,
            compensation_step_ml: DEFAULT_COMPENSATION_STEP_ML,
            duration_min: 30.0,
        }
    }

    /// Normalized-OD thresholds with default compensation and a 30 min cycle.
    pub fn normalized(min: f64, max: f64, volume_ml: f64) -> Self {
        Self {
            min_od: None,
            max_od: None,
            min_normalized_od: Some(min),
            max_normalized_od: Some(max),
            ..Self::raw(0.0, 0.0, volume_ml)
        }
    }
}

fn pair(min: Option<f64>, max: Option<f64>) -> Result<Option<(f64, f64)>> {
    match (min, max) {
        (Some(lo), Some(hi)) => Ok(Some((lo, hi))),
        (None, None) => Ok(None),
        _ => Err(eyre::Report::new(BuildError::InvalidConfig(
            "min and max thresholds must be given together",
        ))),
    }
}

/// Turbidostat that starts diluting above `max`, keeps going until the
/// reading drops below `min`, and grows the dose when one is not enough.
#[derive(Debug)]
pub struct AdaptedTurbidostat {
    signal: OdSignal,
    doser: HysteresisDoser,
    duration_min: f64,
}

const SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("volume", "mL"),
    PublishedSetting::float("max_od", "OD"),
    PublishedSetting::float("min_od", "OD"),
    PublishedSetting::float("max_normalized_od", "AU"),
    PublishedSetting::float("min_normalized_od", "AU"),
    PublishedSetting::flag("use_normalized_od").read_only(),
    PublishedSetting::float("duration", "min"),
];

impl AdaptedTurbidostat {
    pub fn new(params: AdaptedTurbidostatParams, gate: &dyn CalibrationGate) -> Result<Self> {
        require_calibration(gate, &[Pump::Media, Pump::Waste])?;
        let raw = pair(params.min_od, params.max_od)?;
        let normalized = pair(params.min_normalized_od, params.max_normalized_od)?;
        let (signal, (min, max)) = pick_target(raw, normalized)?;
        check_duration(params.duration_min)?;
        let doser =
            HysteresisDoser::new(min, max, params.volume_ml, params.compensation_step_ml)?;
        Ok(Self {
            signal,
            doser,
            duration_min: params.duration_min,
        })
    }

    pub fn use_normalized_od(&self) -> bool {
        self.signal == OdSignal::Normalized
    }

    pub fn doser(&self) -> &HysteresisDoser {
        &self.doser
    }

    fn set_threshold(
        &mut self,
        wanted: OdSignal,
        is_max: bool,
        name: &str,
        value: SettingValue,
    ) -> Result<SettingUpdate> {
        if wanted != self.signal {
            let reason = format!(
                "currently using {}, and can only change those thresholds",
                self.signal.label()
            );
            return Ok(ignored(name, &reason));
        }
        let v = value.as_float(name)?;
        let res = if is_max {
            self.doser.set_max(v)
        } else {
            self.doser.set_min(v)
        };
        match res {
            Ok(()) => Ok(SettingUpdate::Applied),
            Err(e) => Ok(ignored(name, &e.to_string())),
        }
    }
}

impl Automation for AdaptedTurbidostat {
    type Actuator = dyn ActuationExecutor;

    fn name(&self) -> &'static str {
        "adapted_turbidostat"
    }

    fn published_settings(&self) -> &'static [PublishedSetting] {
        SETTINGS
    }

    fn decide(
        &mut self,
        cycle: &Cycle,
        executor: &mut Self::Actuator,
    ) -> Result<Option<DecisionEvent>> {
        let latest = cycle.readings.require(self.signal.kind())?;
        let volume_ml = match self.doser.evaluate(latest)? {
            HysteresisDecision::Dose { volume_ml } => volume_ml,
            HysteresisDecision::Stop => {
                tracing::debug!(latest, "below min threshold; dilutions stopped");
                return Ok(None);
            }
            HysteresisDecision::Hold => return Ok(None),
        };
        let min = self.doser.thresholds().min;
        let moved = match dose(executor, DoseVolumes::exchange_media(volume_ml), &cycle.stop) {
            Ok(moved) => moved,
            Err(e) => {
                self.doser.rollback();
                return Err(e);
            }
        };
        let label = self.signal.label();
        Ok(Some(
            DecisionEvent::new(
                EventKind::DilutionEvent,
                format!(
                    "Latest {label} = {latest:.2} ≥ Min {label} = {min:.2}; cycled {:.2} mL",
                    moved.media_ml
                ),
            )
            .with(self.signal.latest_key(), latest)
            .with(self.signal.target_key(), min)
            .with("volume", moved.media_ml),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(SETTINGS, name)?;
        match name {
            "volume" => {
                self.doser.reconfigure_volume(value.as_float(name)?)?;
                Ok(SettingUpdate::Applied)
            }
            "max_od" => self.set_threshold(OdSignal::Raw, true, name, value),
            "min_od" => self.set_threshold(OdSignal::Raw, false, name, value),
            "max_normalized_od" => self.set_threshold(OdSignal::Normalized, true, name, value),
            "min_normalized_od" => self.set_threshold(OdSignal::Normalized, false, name, value),
            _ => set_duration(&mut self.duration_min, value),
        }
    }
}
