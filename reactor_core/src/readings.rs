//! Scalar sensor readings handed to an automation once per cycle.
use std::fmt;

use crate::error::{ReactorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Od,
    NormalizedOd,
    Temperature,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::Od => "od",
            SignalKind::NormalizedOd => "normalized_od",
            SignalKind::Temperature => "temperature",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub kind: SignalKind,
    pub channel: u8,
    pub value: f64,
}

impl SensorReading {
    pub fn new(kind: SignalKind, channel: u8, value: f64) -> Self {
        Self {
            kind,
            channel,
            value,
        }
    }
}

/// Everything observed during one cycle. Missing signals are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readings {
    pub od: Option<SensorReading>,
    pub normalized_od: Option<SensorReading>,
    pub temperature: Option<SensorReading>,
}

/// Photodiode channel the OD signals are read from.
pub const OD_CHANNEL: u8 = 2;

impl Readings {
    pub fn with_od(mut self, value: f64) -> Self {
        self.od = Some(SensorReading::new(SignalKind::Od, OD_CHANNEL, value));
        self
    }

    pub fn with_normalized_od(mut self, value: f64) -> Self {
        self.normalized_od = Some(SensorReading::new(
            SignalKind::NormalizedOd,
            OD_CHANNEL,
            value,
        ));
        self
    }

    pub fn with_temperature(mut self, value: f64) -> Self {
        self.temperature = Some(SensorReading::new(SignalKind::Temperature, 0, value));
        self
    }

    pub fn get(&self, kind: SignalKind) -> Option<SensorReading> {
        match kind {
            SignalKind::Od => self.od,
            SignalKind::NormalizedOd => self.normalized_od,
            SignalKind::Temperature => self.temperature,
        }
    }

    /// Value of `kind`, or `MissingReading` if absent. Non-finite values are
    /// rejected as invalid input.
    pub fn require(&self, kind: SignalKind) -> Result<f64> {
        let r = self
            .get(kind)
            .ok_or_else(|| eyre::Report::new(ReactorError::MissingReading(kind)))?;
        if !r.value.is_finite() {
            return Err(eyre::Report::new(ReactorError::InvalidInput(format!(
                "{kind} reading is {}",
                r.value
            ))));
        }
        Ok(r.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_missing_signal() {
        let r = Readings::default().with_od(0.5);
        assert_eq!(r.require(SignalKind::Od).unwrap(), 0.5);
        let err = r.require(SignalKind::Temperature).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReactorError>(),
            Some(&ReactorError::MissingReading(SignalKind::Temperature))
        );
    }

    #[test]
    fn require_rejects_nan() {
        let r = Readings::default().with_normalized_od(f64::NAN);
        let err = r.require(SignalKind::NormalizedOd).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReactorError>(),
            Some(ReactorError::InvalidInput(_))
        ));
    }
}
