//! Linear setpoint ramp feeding an owned PID controller.
//!
//! Each cycle the current target moves toward the final target at
//! `(final - start) / time_to_reach` per minute and never passes it. The PID
//! output is a delta to apply to whatever the actuator currently holds.

use crate::error::{Result, invalid_input, invalid_value};
use crate::pid::{FeedbackController, Gains, OutputLimits, SetpointPolicy};

/// Highest target the ramp will accept (°C for the heater).
pub const DEFAULT_CEILING: f64 = 50.0;
/// Elapsed time handed to the PID for every correction.
pub const DEFAULT_NOMINAL_DT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampConfig {
    pub start: f64,
    pub final_target: f64,
    /// Minutes from `start` to `final_target`.
    pub time_to_reach: f64,
    pub ceiling: f64,
    pub nominal_dt: f64,
}

impl RampConfig {
    pub fn new(start: f64, final_target: f64, time_to_reach: f64) -> Self {
        Self {
            start,
            final_target,
            time_to_reach,
            ceiling: DEFAULT_CEILING,
            nominal_dt: DEFAULT_NOMINAL_DT,
        }
    }
}

/// Result of one correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampStep {
    /// Target the correction was computed against.
    pub target: f64,
    /// Clamped PID output.
    pub delta: f64,
    /// `delta` after damping; equals `delta` when no damping applied.
    pub applied_delta: f64,
}

#[derive(Debug, Clone)]
pub struct RampedSetpointController {
    start: f64,
    final_target: f64,
    current_target: f64,
    time_to_reach: f64,
    rate: f64,
    elapsed: f64,
    ceiling: f64,
    nominal_dt: f64,
    pid: FeedbackController,
}

impl RampedSetpointController {
    pub fn new(
        cfg: RampConfig,
        gains: Gains,
        limits: OutputLimits,
        policy: SetpointPolicy,
    ) -> Result<Self> {
        for (field, v) in [
            ("start_temperature", cfg.start),
            ("final_target_temperature", cfg.final_target),
            ("ceiling", cfg.ceiling),
        ] {
            if !v.is_finite() {
                return Err(invalid_value(field, v));
            }
        }
        if !cfg.time_to_reach.is_finite() || cfg.time_to_reach <= 0.0 {
            return Err(invalid_value("time_to_reach", cfg.time_to_reach));
        }
        if !cfg.nominal_dt.is_finite() || cfg.nominal_dt <= 0.0 {
            return Err(invalid_value("nominal_dt", cfg.nominal_dt));
        }
        if cfg.ceiling <= 0.0 {
            return Err(invalid_value("ceiling", cfg.ceiling));
        }
        let start = cfg.start.clamp(0.0, cfg.ceiling);
        let final_target = cfg.final_target.clamp(0.0, cfg.ceiling);
        let pid = FeedbackController::new(gains, start, limits)?.with_policy(policy);
        Ok(Self {
            start,
            final_target,
            current_target: start,
            time_to_reach: cfg.time_to_reach,
            rate: (final_target - start) / cfg.time_to_reach,
            elapsed: 0.0,
            ceiling: cfg.ceiling,
            nominal_dt: cfg.nominal_dt,
            pid,
        })
    }

    fn rising(&self) -> bool {
        self.rate >= 0.0
    }

    /// Clamp `v` so it does not pass the final target in the ramp direction.
    fn bounded(&self, v: f64) -> f64 {
        if self.rising() {
            v.min(self.final_target)
        } else {
            v.max(self.final_target)
        }
    }

    fn is_past_final(&self, v: f64) -> bool {
        if self.rising() {
            v > self.final_target
        } else {
            v < self.final_target
        }
    }

    /// Move the current target by `rate * elapsed_min`. Returns the new target.
    pub fn advance(&mut self, elapsed_min: f64) -> Result<f64> {
        if !elapsed_min.is_finite() || elapsed_min < 0.0 {
            return Err(invalid_input(format!(
                "elapsed time must be >= 0, got {elapsed_min}"
            )));
        }
        self.elapsed += elapsed_min;
        self.current_target = self.bounded(self.current_target + self.rate * elapsed_min);
        self.pid.set_setpoint(self.current_target)?;
        Ok(self.current_target)
    }

    /// Compute a delta for `measured` against the current target.
    ///
    /// `damping` is the fraction of a cycle left before the next scheduled
    /// run; the applied delta is scaled by `1 - damping` (clamped to [0, 1]).
    /// The part not applied is dropped, not carried into the next cycle.
    pub fn correction(&mut self, measured: f64, damping: Option<f64>) -> Result<RampStep> {
        let f = match damping {
            Some(f) if !f.is_finite() => {
                return Err(invalid_input(format!("damping ratio must be finite, got {f}")));
            }
            Some(f) => Some(f.clamp(0.0, 1.0)),
            None => None,
        };
        self.pid.set_setpoint(self.current_target)?;
        let delta = self.pid.update(measured, self.nominal_dt)?;
        let applied_delta = f.map_or(delta, |f| delta * (1.0 - f));
        Ok(RampStep {
            target: self.current_target,
            delta,
            applied_delta,
        })
    }

    /// Jump the current target to `value` (clamped to `[0, ceiling]`).
    ///
    /// A value past the final target becomes the new final target. With
    /// `immediate = Some((measured, damping))` an out-of-cycle correction is
    /// computed and returned.
    pub fn set_target(
        &mut self,
        value: f64,
        immediate: Option<(f64, Option<f64>)>,
    ) -> Result<Option<RampStep>> {
        if !value.is_finite() {
            return Err(invalid_input(format!("target must be finite, got {value}")));
        }
        if value > self.ceiling {
            tracing::warn!(
                requested = value,
                ceiling = self.ceiling,
                "values over {} are not supported; clamping",
                self.ceiling
            );
        }
        let value = value.clamp(0.0, self.ceiling);
        if self.is_past_final(value) {
            self.final_target = value;
        }
        self.current_target = value;
        self.pid.set_setpoint(value)?;
        match immediate {
            Some((measured, damping)) => self.correction(measured, damping).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_final_target(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(invalid_input(format!("final target must be finite, got {value}")));
        }
        self.final_target = value.clamp(0.0, self.ceiling);
        self.recompute_rate();
        Ok(())
    }

    pub fn set_start(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(invalid_input(format!("start must be finite, got {value}")));
        }
        self.start = value.clamp(0.0, self.ceiling);
        self.recompute_rate();
        Ok(())
    }

    pub fn set_time_to_reach(&mut self, minutes: f64) -> Result<()> {
        if !minutes.is_finite() || minutes <= 0.0 {
            return Err(invalid_input(format!("time_to_reach must be > 0, got {minutes}")));
        }
        self.time_to_reach = minutes;
        self.recompute_rate();
        Ok(())
    }

    fn recompute_rate(&mut self) {
        self.rate = (self.final_target - self.start) / self.time_to_reach;
        self.current_target = self.bounded(self.current_target);
    }

    pub fn current_target(&self) -> f64 {
        self.current_target
    }

    pub fn final_target(&self) -> f64 {
        self.final_target
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn time_to_reach(&self) -> f64 {
        self.time_to_reach
    }

    /// Degrees per minute; negative for a cooling ramp.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Total minutes advanced so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn controller(&self) -> &FeedbackController {
        &self.pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: f64, fin: f64, minutes: f64) -> RampedSetpointController {
        RampedSetpointController::new(
            RampConfig::new(start, fin, minutes),
            Gains::new(1.0, 0.0, 0.0),
            OutputLimits::new(-25.0, 25.0),
            SetpointPolicy::KeepState,
        )
        .unwrap()
    }

    #[test]
    fn advances_linearly_and_stops_at_final() {
        let mut r = ramp(20.0, 30.0, 10.0);
        assert_eq!(r.rate(), 1.0);
        assert_eq!(r.advance(4.0).unwrap(), 24.0);
        assert_eq!(r.advance(100.0).unwrap(), 30.0);
        assert_eq!(r.elapsed(), 104.0);
    }

    #[test]
    fn cooling_ramp_is_supported() {
        let mut r = ramp(30.0, 20.0, 5.0);
        assert_eq!(r.advance(1.0).unwrap(), 28.0);
        assert_eq!(r.advance(10.0).unwrap(), 20.0);
    }

    #[test]
    fn damping_scales_applied_delta_only() {
        let mut r = ramp(20.0, 30.0, 10.0);
        let step = r.correction(18.0, Some(0.25)).unwrap();
        assert_eq!(step.delta, 2.0);
        assert_eq!(step.applied_delta, 1.5);
        let step = r.correction(18.0, Some(3.0)).unwrap();
        assert_eq!(step.applied_delta, 0.0);
    }

    #[test]
    fn set_target_clamps_to_ceiling_and_extends_final() {
        let mut r = ramp(20.0, 30.0, 10.0);
        r.set_target(80.0, None).unwrap();
        assert_eq!(r.current_target(), 50.0);
        assert_eq!(r.final_target(), 50.0);
        assert_eq!(r.controller().setpoint(), 50.0);
    }

    #[test]
    fn set_target_below_final_keeps_final() {
        let mut r = ramp(20.0, 30.0, 10.0);
        let step = r.set_target(25.0, Some((24.0, None))).unwrap().unwrap();
        assert_eq!(step.target, 25.0);
        assert_eq!(step.delta, 1.0);
        assert_eq!(r.final_target(), 30.0);
    }

    #[test]
    fn changing_start_recomputes_rate() {
        let mut r = ramp(20.0, 30.0, 10.0);
        r.set_start(25.0).unwrap();
        assert_eq!(r.rate(), 0.5);
        r.set_time_to_reach(2.5).unwrap();
        assert_eq!(r.rate(), 2.0);
        assert!(r.set_time_to_reach(0.0).is_err());
    }

    #[test]
    fn rejects_zero_time_to_reach() {
        let err = RampedSetpointController::new(
            RampConfig::new(20.0, 30.0, 0.0),
            Gains::new(1.0, 0.0, 0.0),
            OutputLimits::new(-25.0, 25.0),
            SetpointPolicy::KeepState,
        )
        .unwrap_err();
        assert!(err.to_string().contains("time_to_reach"));
    }
}
