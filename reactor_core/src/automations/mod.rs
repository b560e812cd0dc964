//! Periodic strategies composed from the control components.
//!
//! Each automation owns its state and makes one decision per `Cycle`. The
//! actuator is passed in per call so the caller keeps ownership of hardware.

mod adapted_turbidostat;
mod chemostat;
mod light_cycle;
mod naive_turbidostat;
mod pid_turbidostat;
mod random_temperature;
mod switching_dosing;
mod temperature_gradient;

pub use adapted_turbidostat::{AdaptedTurbidostat, AdaptedTurbidostatParams};
pub use chemostat::{Chemostat, ChemostatParams, ChemostatWithInducer, ChemostatWithInducerParams};
pub use light_cycle::{LightCycle, LightCycleParams, light_at};
pub use naive_turbidostat::{NaiveTurbidostat, NaiveTurbidostatParams};
pub use pid_turbidostat::{PidTurbidostat, PidTurbidostatParams};
pub use random_temperature::{RandomTemperature, RandomTemperatureParams};
pub use switching_dosing::{SwitchingDosing, SwitchingDosingParams};
pub use temperature_gradient::{TemperatureGradient, TemperatureGradientParams};

use reactor_traits::{ActuationExecutor, CalibrationGate, DoseVolumes, Pump, StopFlag};

use crate::error::{BuildError, Result, invalid_input};
use crate::event::DecisionEvent;
use crate::hw_error::to_report;
use crate::readings::{Readings, SignalKind};
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue};

/// Inputs for one scheduled decision.
#[derive(Debug, Clone, Default)]
pub struct Cycle {
    pub readings: Readings,
    /// Minutes since the previous decision.
    pub elapsed_min: f64,
    /// Minutes until the scheduler's next run, when known.
    pub time_to_next_run_min: Option<f64>,
    pub stop: StopFlag,
}

impl Cycle {
    pub fn new(readings: Readings, elapsed_min: f64) -> Self {
        Self {
            readings,
            elapsed_min,
            time_to_next_run_min: None,
            stop: StopFlag::new(),
        }
    }
}

pub trait Automation {
    /// What this automation drives (`dyn ActuationExecutor`, `dyn Heater`, ...).
    type Actuator: ?Sized;

    fn name(&self) -> &'static str;

    fn published_settings(&self) -> &'static [PublishedSetting];

    /// Make this cycle's decision. `None` means no action was taken.
    fn decide(
        &mut self,
        cycle: &Cycle,
        actuator: &mut Self::Actuator,
    ) -> Result<Option<DecisionEvent>>;

    /// Change a published setting between cycles.
    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate>;
}

/// Fail construction unless every pump in `pumps` has a calibration on file.
pub fn require_calibration(gate: &dyn CalibrationGate, pumps: &[Pump]) -> Result<()> {
    match pumps.iter().find(|p| !gate.has_calibration(**p)) {
        Some(p) => Err(eyre::Report::new(BuildError::MissingCalibration(*p))),
        None => Ok(()),
    }
}

/// Which OD signal a turbidostat follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdSignal {
    Raw,
    Normalized,
}

impl OdSignal {
    pub fn kind(self) -> SignalKind {
        match self {
            OdSignal::Raw => SignalKind::Od,
            OdSignal::Normalized => SignalKind::NormalizedOd,
        }
    }

    pub(crate) fn latest_key(self) -> &'static str {
        match self {
            OdSignal::Raw => "latest_od",
            OdSignal::Normalized => "latest_normalized_od",
        }
    }

    pub(crate) fn target_key(self) -> &'static str {
        match self {
            OdSignal::Raw => "target_od",
            OdSignal::Normalized => "target_normalized_od",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            OdSignal::Raw => "OD",
            OdSignal::Normalized => "Normalized OD",
        }
    }
}

/// Pick exactly one of a raw and a normalized target.
pub(crate) fn pick_target<T>(raw: Option<T>, normalized: Option<T>) -> Result<(OdSignal, T)> {
    match (raw, normalized) {
        (Some(_), Some(_)) => Err(eyre::Report::new(BuildError::ConflictingTarget)),
        (Some(t), None) => Ok((OdSignal::Raw, t)),
        (None, Some(t)) => Ok((OdSignal::Normalized, t)),
        (None, None) => Err(eyre::Report::new(BuildError::MissingTarget)),
    }
}

pub(crate) fn check_duration(duration_min: f64) -> Result<()> {
    if !duration_min.is_finite() || duration_min <= 0.0 {
        return Err(crate::error::invalid_value("duration", duration_min));
    }
    Ok(())
}

pub(crate) fn set_duration(duration: &mut f64, value: SettingValue) -> Result<SettingUpdate> {
    let v = value.as_float("duration")?;
    if v <= 0.0 {
        return Err(invalid_input(format!("duration must be > 0, got {v}")));
    }
    *duration = v;
    Ok(SettingUpdate::Applied)
}

/// Run a dose through the executor, mapping its error into our taxonomy.
pub(crate) fn dose(
    executor: &mut dyn ActuationExecutor,
    request: DoseVolumes,
    stop: &StopFlag,
) -> Result<DoseVolumes> {
    let moved = executor.execute(&request, stop).map_err(to_report)?;
    tracing::info!(
        media_ml = moved.media_ml,
        alt_media_ml = moved.alt_media_ml,
        waste_ml = moved.waste_ml,
        "dosed"
    );
    Ok(moved)
}

/// Log and report a setting change that does not apply to the current mode.
pub(crate) fn ignored(name: &str, reason: &str) -> SettingUpdate {
    tracing::warn!(setting = name, "{reason}; setting ignored");
    SettingUpdate::Ignored
}
