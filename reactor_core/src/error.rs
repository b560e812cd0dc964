use reactor_traits::Pump;
use thiserror::Error;

use crate::readings::SignalKind;

/// Recoverable failures raised while an automation is running.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReactorError {
    #[error("actuation failed: {0}")]
    Executor(String),
    #[error("timeout waiting for actuation")]
    Timeout,
    #[error("stop requested")]
    Cancelled,
    #[error("no {0} reading this cycle")]
    MissingReading(SignalKind),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("mixture did not converge after {exchanges} exchanges")]
    NotConverged { exchanges: u32 },
    #[error("unknown setting '{0}'")]
    UnknownSetting(String),
    #[error("setting '{0}' is read-only")]
    ReadOnlySetting(String),
    #[error("setting '{name}' expects a {expected} value")]
    SettingType { name: String, expected: &'static str },
}

/// Construction-time failures; no automation state exists when these are returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("{0} pump calibration must be performed first")]
    MissingCalibration(Pump),
    #[error("only provide a raw OD target or a normalized OD target, not both")]
    ConflictingTarget,
    #[error("provide a raw OD target or a normalized OD target")]
    MissingTarget,
    #[error("invalid value for {field}: {value}")]
    InvalidDomainValue { field: &'static str, value: f64 },
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

pub(crate) fn invalid_input(msg: impl Into<String>) -> Report {
    Report::new(ReactorError::InvalidInput(msg.into()))
}

pub(crate) fn invalid_value(field: &'static str, value: f64) -> Report {
    Report::new(BuildError::InvalidDomainValue { field, value })
}
