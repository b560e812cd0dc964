//! Two-threshold dosing state machine with adaptive volume compensation.
//!
//! | phase  | reading            | next   | decision              |
//! |--------|--------------------|--------|-----------------------|
//! | any    | `r >= max`         | Active | dose (step up if already Active) |
//! | Active | `min <= r < max`   | Active | dose at current volume |
//! | Active | `r < min`          | Idle   | stop                  |
//! | Idle   | `r < max`          | Idle   | hold                  |
//!
//! The dose volume only ever grows while compensating. It returns to nominal
//! through `reconfigure_volume`, never on its own. A dose that never happened
//! must not count toward compensation: `rollback` undoes the last `evaluate`.

use crate::error::{BuildError, Result, invalid_input, invalid_value};

pub const DEFAULT_COMPENSATION_STEP_ML: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoserPhase {
    #[default]
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HysteresisDecision {
    Dose { volume_ml: f64 },
    /// Left the active phase this cycle.
    Stop,
    /// Nothing to do.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min: f64,
    pub max: f64,
}

impl Thresholds {
    fn checked(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min >= 0.0 && min < max).then_some(Self { min, max })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HysteresisDoser {
    phase: DoserPhase,
    thresholds: Thresholds,
    nominal_volume_ml: f64,
    volume_ml: f64,
    compensation_step_ml: f64,
    /// Phase and volume before the most recent `evaluate`.
    checkpoint: (DoserPhase, f64),
}

impl HysteresisDoser {
    pub fn new(min: f64, max: f64, volume_ml: f64, compensation_step_ml: f64) -> Result<Self> {
        let thresholds = Thresholds::checked(min, max).ok_or_else(|| {
            eyre::Report::new(BuildError::InvalidConfig(
                "min threshold must be >= 0 and below max threshold",
            ))
        })?;
        if !volume_ml.is_finite() || volume_ml < 0.0 {
            return Err(invalid_value("volume", volume_ml));
        }
        if !compensation_step_ml.is_finite() || compensation_step_ml < 0.0 {
            return Err(invalid_value("compensation_step_ml", compensation_step_ml));
        }
        Ok(Self {
            phase: DoserPhase::Idle,
            thresholds,
            nominal_volume_ml: volume_ml,
            volume_ml,
            compensation_step_ml,
            checkpoint: (DoserPhase::Idle, volume_ml),
        })
    }

    /// Advance the state machine with this cycle's reading.
    pub fn evaluate(&mut self, reading: f64) -> Result<HysteresisDecision> {
        if !reading.is_finite() {
            return Err(invalid_input(format!("reading must be finite, got {reading}")));
        }
        self.checkpoint = (self.phase, self.volume_ml);
        let Thresholds { min, max } = self.thresholds;
        let decision = match self.phase {
            _ if reading >= max => {
                if self.phase == DoserPhase::Active {
                    self.volume_ml += self.compensation_step_ml;
                    tracing::debug!(
                        volume_ml = self.volume_ml,
                        "still above max after dosing; compensating"
                    );
                }
                self.phase = DoserPhase::Active;
                HysteresisDecision::Dose {
                    volume_ml: self.volume_ml,
                }
            }
            DoserPhase::Active if reading >= min => HysteresisDecision::Dose {
                volume_ml: self.volume_ml,
            },
            DoserPhase::Active => {
                self.phase = DoserPhase::Idle;
                HysteresisDecision::Stop
            }
            DoserPhase::Idle => HysteresisDecision::Hold,
        };
        Ok(decision)
    }

    /// Replace the nominal volume; the compensated volume restarts from it.
    pub fn reconfigure_volume(&mut self, volume_ml: f64) -> Result<()> {
        if !volume_ml.is_finite() || volume_ml < 0.0 {
            return Err(invalid_input(format!("volume must be >= 0, got {volume_ml}")));
        }
        self.nominal_volume_ml = volume_ml;
        self.volume_ml = volume_ml;
        self.checkpoint.1 = volume_ml;
        Ok(())
    }

    /// Restore the phase and volume from before the last `evaluate`, for
    /// when the decided dose failed.
    pub fn rollback(&mut self) {
        let (phase, volume_ml) = self.checkpoint;
        tracing::debug!(?phase, volume_ml, "dose failed; rolling back doser state");
        self.phase = phase;
        self.volume_ml = volume_ml;
    }

    pub fn set_thresholds(&mut self, min: f64, max: f64) -> Result<()> {
        self.thresholds = Thresholds::checked(min, max).ok_or_else(|| {
            invalid_input(format!("thresholds must satisfy 0 <= min < max, got ({min}, {max})"))
        })?;
        Ok(())
    }

    pub fn set_min(&mut self, min: f64) -> Result<()> {
        self.set_thresholds(min, self.thresholds.max)
    }

    pub fn set_max(&mut self, max: f64) -> Result<()> {
        self.set_thresholds(self.thresholds.min, max)
    }

    pub fn phase(&self) -> DoserPhase {
        self.phase
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn volume_ml(&self) -> f64 {
        self.volume_ml
    }

    pub fn nominal_volume_ml(&self) -> f64 {
        self.nominal_volume_ml
    }

    pub fn compensation_step_ml(&self) -> f64 {
        self.compensation_step_ml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn doser() -> HysteresisDoser {
        HysteresisDoser::new(1.9, 2.0, 0.1, DEFAULT_COMPENSATION_STEP_ML).unwrap()
    }

    #[test]
    fn compensates_then_stops() {
        let mut d = doser();
        assert_eq!(d.evaluate(3.0).unwrap(), HysteresisDecision::Dose { volume_ml: 0.1 });
        match d.evaluate(3.0).unwrap() {
            HysteresisDecision::Dose { volume_ml } => assert!((volume_ml - 0.2).abs() < 1e-12),
            other => panic!("expected dose, got {other:?}"),
        }
        assert_eq!(d.evaluate(0.9).unwrap(), HysteresisDecision::Stop);
        assert_eq!(d.phase(), DoserPhase::Idle);
    }

    #[test]
    fn compensation_survives_idle_periods() {
        let mut d = doser();
        d.evaluate(2.5).unwrap();
        d.evaluate(2.5).unwrap();
        d.evaluate(1.0).unwrap();
        for _ in 0..10 {
            assert_eq!(d.evaluate(1.95).unwrap(), HysteresisDecision::Hold);
        }
        assert!((d.volume_ml() - 0.2).abs() < 1e-12);
        d.reconfigure_volume(0.1).unwrap();
        assert_eq!(d.volume_ml(), 0.1);
    }

    #[rstest]
    #[case(2.0, 1.9)]
    #[case(1.0, 1.0)]
    #[case(-0.1, 1.0)]
    #[case(f64::NAN, 1.0)]
    fn rejects_bad_threshold_pairs(#[case] min: f64, #[case] max: f64) {
        assert!(HysteresisDoser::new(min, max, 0.1, 0.1).is_err());
        let mut d = doser();
        assert!(d.set_thresholds(min, max).is_err());
        assert_eq!(d.thresholds(), Thresholds { min: 1.9, max: 2.0 });
    }

    #[test]
    fn rollback_discards_undelivered_compensation() {
        let mut d = doser();
        for _ in 0..3 {
            assert!(matches!(d.evaluate(3.0).unwrap(), HysteresisDecision::Dose { .. }));
            d.rollback();
        }
        assert_eq!(d.phase(), DoserPhase::Idle);
        assert_eq!(d.evaluate(3.0).unwrap(), HysteresisDecision::Dose { volume_ml: 0.1 });

        // a delivered dose is kept; only the failed follow-up is undone
        d.evaluate(3.0).unwrap();
        d.rollback();
        assert_eq!(d.phase(), DoserPhase::Active);
        assert_eq!(d.volume_ml(), 0.1);
    }

    #[test]
    fn active_band_keeps_dosing() {
        let mut d = doser();
        d.evaluate(2.0).unwrap();
        assert_eq!(d.evaluate(1.9).unwrap(), HysteresisDecision::Dose { volume_ml: 0.1 });
    }
}
