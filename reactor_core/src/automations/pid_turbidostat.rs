use reactor_traits::{ActuationExecutor, CalibrationGate, DoseVolumes, Pump};

use super::{
    Automation, Cycle, OdSignal, check_duration, dose, ignored, pick_target, require_calibration,
    set_duration,
};
use crate::error::{Result, invalid_input, invalid_value};
use crate::event::{DecisionEvent, EventKind};
use crate::pid::{FeedbackController, Gains, OutputLimits, SetpointPolicy};
use crate::settings::{PublishedSetting, SettingUpdate, SettingValue, find_settable};

#[derive(Debug, Clone)]
pub struct PidTurbidostatParams {
    pub target_od: Option<f64>,
    pub target_normalized_od: Option<f64>,
    pub duration_min: f64,
    /// Gains as configured; they are negated internally.
    pub gains: Gains,
    pub setpoint_policy: SetpointPolicy,
    pub vial_volume_ml: f64,
}

/// Turbidostat that sizes each dilution with a PID on the OD error.
#[derive(Debug)]
pub struct PidTurbidostat {
    signal: OdSignal,
    target: f64,
    duration_min: f64,
    pid: FeedbackController,
}

const SETTINGS: &[PublishedSetting] = &[
    PublishedSetting::float("target_normalized_od", "AU"),
    PublishedSetting::float("target_od", "OD"),
    PublishedSetting::float("duration", "min"),
];

impl PidTurbidostat {
    pub fn new(params: PidTurbidostatParams, gate: &dyn CalibrationGate) -> Result<Self> {
        require_calibration(gate, &[Pump::Media, Pump::Waste])?;
        let (signal, target) = pick_target(params.target_od, params.target_normalized_od)?;
        if !target.is_finite() || target < 0.0 {
            return Err(invalid_value(signal.target_key(), target));
        }
        check_duration(params.duration_min)?;
        // More density than target must mean more dilution.
        let pid = FeedbackController::new(
            params.gains.negated(),
            target,
            OutputLimits::new(0.0, params.vial_volume_ml),
        )?
        .with_policy(params.setpoint_policy);
        Ok(Self {
            signal,
            target,
            duration_min: params.duration_min,
            pid,
        })
    }

    pub fn signal(&self) -> OdSignal {
        self.signal
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn controller(&self) -> &FeedbackController {
        &self.pid
    }

    fn set_target(
        &mut self,
        wanted: OdSignal,
        name: &str,
        value: SettingValue,
    ) -> Result<SettingUpdate> {
        if wanted != self.signal {
            let reason = format!(
                "currently targeting {}, and can only change that",
                self.signal.label()
            );
            return Ok(ignored(name, &reason));
        }
        let v = value.as_float(name)?;
        if v < 0.0 {
            return Err(invalid_input(format!("{name} must be >= 0, got {v}")));
        }
        self.pid.set_setpoint(v)?;
        self.target = v;
        Ok(SettingUpdate::Applied)
    }
}

impl Automation for PidTurbidostat {
    type Actuator = dyn ActuationExecutor;

    fn name(&self) -> &'static str {
        "pid_turbidostat"
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
        if latest < self.target {
            tracing::debug!(latest, target = self.target, "below target; no dilution");
            return Ok(None);
        }
        let target = self.target;
        let volume = self.pid.update(latest, self.duration_min / 60.0)?;
        let moved = dose(executor, DoseVolumes::exchange_media(volume), &cycle.stop)?;
        let label = self.signal.label();
        Ok(Some(
            DecisionEvent::new(
                EventKind::DilutionEvent,
                format!(
                    "Latest {label} = {latest:.2} ≥ Target {label} = {target:.2}; cycled {:.2} mL",
                    moved.media_ml
                ),
            )
            .with(self.signal.latest_key(), latest)
            .with(self.signal.target_key(), target)
            .with("volume", moved.media_ml),
        ))
    }

    fn apply_setting(&mut self, name: &str, value: SettingValue) -> Result<SettingUpdate> {
        find_settable(SETTINGS, name)?;
        match name {
            "target_od" => self.set_target(OdSignal::Raw, name, value),
            "target_normalized_od" => self.set_target(OdSignal::Normalized, name, value),
            _ => set_duration(&mut self.duration_min, value),
        }
    }
}
