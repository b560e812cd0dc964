//! Clamped PID controller driven by caller-supplied elapsed time.
//!
//! The controller never reads a clock: every `update` carries the time since
//! the previous one, so a run can be replayed exactly from a recorded trace.
//! Anti-windup is by output clamping only; the integral itself is not bounded
//! and can keep growing while the output sits at a limit.

use crate::error::{BuildError, Result, invalid_input, invalid_value};

/// Signed gains. Negative gains express "more signal, more correction" loops
/// such as dilution on rising density.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    #[must_use]
    pub fn negated(self) -> Self {
        Self::new(-self.kp, -self.ki, -self.kd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputLimits {
    pub lower: f64,
    pub upper: f64,
}

impl OutputLimits {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// What happens to the integral and previous error when the setpoint moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SetpointPolicy {
    /// Keep accumulated state across setpoint changes.
    #[default]
    KeepState,
    /// Clear integral and previous error whenever the setpoint actually changes.
    ResetState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackController {
    gains: Gains,
    setpoint: f64,
    limits: OutputLimits,
    policy: SetpointPolicy,
    integral: f64,
    prev_error: Option<f64>,
}

impl FeedbackController {
    pub fn new(gains: Gains, setpoint: f64, limits: OutputLimits) -> Result<Self> {
        for (field, v) in [
            ("Kp", gains.kp),
            ("Ki", gains.ki),
            ("Kd", gains.kd),
            ("setpoint", setpoint),
            ("output lower bound", limits.lower),
            ("output upper bound", limits.upper),
        ] {
            if !v.is_finite() {
                return Err(invalid_value(field, v));
            }
        }
        if limits.lower >= limits.upper {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "output lower bound must be below upper bound",
            )));
        }
        Ok(Self {
            gains,
            setpoint,
            limits,
            policy: SetpointPolicy::default(),
            integral: 0.0,
            prev_error: None,
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: SetpointPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One control step. `elapsed` is the time since the previous update in
    /// whatever unit the gains were tuned for.
    pub fn update(&mut self, measured: f64, elapsed: f64) -> Result<f64> {
        if !elapsed.is_finite() || elapsed <= 0.0 {
            return Err(invalid_input(format!(
                "elapsed time must be > 0, got {elapsed}"
            )));
        }
        if !measured.is_finite() {
            return Err(invalid_input(format!(
                "measured value must be finite, got {measured}"
            )));
        }

        let error = self.setpoint - measured;
        self.integral += error * elapsed;
        let derivative = self
            .prev_error
            .map_or(0.0, |prev| (error - prev) / elapsed);
        self.prev_error = Some(error);

        let Gains { kp, ki, kd } = self.gains;
        let raw = kp * error + ki * self.integral + kd * derivative;
        let OutputLimits { lower, upper } = self.limits;
        let out = if raw.is_nan() {
            0.0_f64.clamp(lower, upper)
        } else {
            raw.clamp(lower, upper)
        };
        tracing::trace!(error, integral = self.integral, derivative, raw, out, "pid step");
        Ok(out)
    }

    /// Replace the setpoint. Takes effect on the next `update`.
    pub fn set_setpoint(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(invalid_input(format!("setpoint must be finite, got {value}")));
        }
        if value == self.setpoint {
            return Ok(());
        }
        self.setpoint = value;
        if self.policy == SetpointPolicy::ResetState {
            self.reset();
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn limits(&self) -> OutputLimits {
        self.limits
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn policy(&self) -> SetpointPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactorError;

    fn pid(kp: f64, ki: f64, kd: f64) -> FeedbackController {
        FeedbackController::new(Gains::new(kp, ki, kd), 10.0, OutputLimits::new(-5.0, 5.0)).unwrap()
    }

    #[test]
    fn first_update_has_no_derivative_kick() {
        let mut c = pid(0.0, 0.0, 100.0);
        assert_eq!(c.update(8.0, 1.0).unwrap(), 0.0);
        // error goes 2 -> 1, derivative -1 -> clamped at -5
        assert_eq!(c.update(9.0, 1.0).unwrap(), -5.0);
    }

    #[test]
    fn proportional_integral_and_derivative_terms_add() {
        let mut c = pid(0.5, 0.1, 0.2);
        // e=2, I=4 (dt 2), D=0 -> 1.0 + 0.4
        assert!((c.update(8.0, 2.0).unwrap() - 1.4).abs() < 1e-12);
        // e=1, I=6, D=(1-2)/2 -> 0.5 + 0.6 - 0.1
        assert!((c.update(9.0, 2.0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(c.integral(), 6.0);
    }

    #[test]
    fn integral_keeps_growing_while_saturated() {
        let mut c = pid(0.0, 1.0, 0.0);
        for _ in 0..100 {
            assert_eq!(c.update(0.0, 1.0).unwrap(), 5.0);
        }
        assert_eq!(c.integral(), 1000.0);
    }

    #[test]
    fn nan_output_resolves_to_bound_nearest_zero() {
        let mut c = FeedbackController::new(
            Gains::new(1.0, 0.0, 0.0),
            0.0,
            OutputLimits::new(0.0, 14.0),
        )
        .unwrap();
        // inf - inf inside the proportional term
        c.gains = Gains::new(f64::INFINITY, f64::NEG_INFINITY, 0.0);
        assert_eq!(c.update(-1.0, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn rejects_inverted_limits() {
        let err = FeedbackController::new(
            Gains::new(1.0, 0.0, 0.0),
            0.0,
            OutputLimits::new(1.0, 1.0),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::InvalidConfig(_))
        ));
    }

    #[test]
    fn non_finite_measurement_is_invalid_input() {
        let mut c = pid(1.0, 0.0, 0.0);
        let err = c.update(f64::NAN, 1.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReactorError>(),
            Some(ReactorError::InvalidInput(_))
        ));
        assert_eq!(c.integral(), 0.0);
    }

    #[test]
    fn reset_policy_clears_state_only_on_real_change() {
        let mut c = pid(0.0, 1.0, 0.0).with_policy(SetpointPolicy::ResetState);
        c.update(9.0, 1.0).unwrap();
        c.set_setpoint(10.0).unwrap();
        assert_eq!(c.integral(), 1.0);
        c.set_setpoint(12.0).unwrap();
        assert_eq!(c.integral(), 0.0);
    }

    #[test]
    fn keep_policy_preserves_state() {
        let mut c = pid(0.0, 1.0, 0.0);
        c.update(9.0, 1.0).unwrap();
        c.set_setpoint(12.0).unwrap();
        assert_eq!(c.integral(), 1.0);
        assert_eq!(c.setpoint(), 12.0);
    }
}
