//! Published settings: metadata and values for runtime mutation.
use std::fmt;
use std::str::FromStr;

use crate::error::{ReactorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Float,
    Bool,
}

impl Datatype {
    pub fn as_str(self) -> &'static str {
        match self {
            Datatype::Float => "float",
            Datatype::Bool => "bool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedSetting {
    pub name: &'static str,
    pub datatype: Datatype,
    pub unit: Option<&'static str>,
    pub settable: bool,
}

impl PublishedSetting {
    pub const fn float(name: &'static str, unit: &'static str) -> Self {
        Self {
            name,
            datatype: Datatype::Float,
            unit: Some(unit),
            settable: true,
        }
    }

    pub const fn flag(name: &'static str) -> Self {
        Self {
            name,
            datatype: Datatype::Bool,
            unit: None,
            settable: true,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.settable = false;
        self
    }
}

/// Look up `name` in `settings`, rejecting unknown and read-only names.
pub fn find_settable(settings: &[PublishedSetting], name: &str) -> Result<PublishedSetting> {
    let s = settings
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| eyre::Report::new(ReactorError::UnknownSetting(name.to_string())))?;
    if !s.settable {
        return Err(eyre::Report::new(ReactorError::ReadOnlySetting(name.to_string())));
    }
    Ok(*s)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Float(f64),
    Bool(bool),
}

impl SettingValue {
    pub fn as_float(self, name: &str) -> Result<f64> {
        match self {
            SettingValue::Float(v) if v.is_finite() => Ok(v),
            SettingValue::Float(v) => Err(eyre::Report::new(ReactorError::InvalidInput(
                format!("{name} must be finite, got {v}"),
            ))),
            SettingValue::Bool(_) => Err(eyre::Report::new(ReactorError::SettingType {
                name: name.to_string(),
                expected: Datatype::Float.as_str(),
            })),
        }
    }
}

impl FromStr for SettingValue {
    type Err = ReactorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "true" => Ok(SettingValue::Bool(true)),
            "false" => Ok(SettingValue::Bool(false)),
            _ => s
                .parse::<f64>()
                .map(SettingValue::Float)
                .map_err(|_| ReactorError::InvalidInput(format!("'{s}' is not a number or bool"))),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Outcome of a runtime setting change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingUpdate {
    Applied,
    /// Rejected with a warning; configuration unchanged.
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_floats_and_bools() {
        assert_eq!("0.5".parse::<SettingValue>().unwrap(), SettingValue::Float(0.5));
        assert_eq!(" true ".parse::<SettingValue>().unwrap(), SettingValue::Bool(true));
        assert!("fast".parse::<SettingValue>().is_err());
    }

    #[test]
    fn read_only_settings_are_rejected() {
        let list = [
            PublishedSetting::float("duration", "min").read_only(),
            PublishedSetting::float("volume", "mL"),
        ];
        assert!(find_settable(&list, "volume").is_ok());
        let err = find_settable(&list, "duration").unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReactorError>(),
            Some(&ReactorError::ReadOnlySetting("duration".into()))
        );
        let err = find_settable(&list, "nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReactorError>(),
            Some(ReactorError::UnknownSetting(_))
        ));
    }
}
