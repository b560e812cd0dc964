//! Pump calibration store.
//!
//! Expected headers:
//! pump,ml_per_sec,bias_ml
//!
//! Example:
//! pump,ml_per_sec,bias_ml
//! media,0.52,0.0
//! waste,0.61,0.01
use reactor_traits::{CalibrationGate, Pump};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct PumpCalibrationRow {
    pub pump: String,
    pub ml_per_sec: f64,
    #[serde(default)]
    pub bias_ml: f64,
}

/// Linear pump model: `ml = ml_per_sec * seconds + bias_ml`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PumpCalibration {
    pub ml_per_sec: f64,
    pub bias_ml: f64,
}

impl PumpCalibration {
    /// Seconds of run time needed to move `ml`, never negative.
    pub fn seconds_for(&self, ml: f64) -> f64 {
        ((ml - self.bias_ml) / self.ml_per_sec).max(0.0)
    }
}

/// Calibrations on file, keyed by pump.
#[derive(Debug, Clone, Default)]
pub struct PumpCalibrations {
    by_pump: BTreeMap<Pump, PumpCalibration>,
}

impl PumpCalibrations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pump: Pump, cal: PumpCalibration) {
        self.by_pump.insert(pump, cal);
    }

    pub fn get(&self, pump: Pump) -> Option<&PumpCalibration> {
        self.by_pump.get(&pump)
    }

    pub fn len(&self) -> usize {
        self.by_pump.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pump.is_empty()
    }

    /// Validate rows and build the store. Unknown pump names, duplicates and
    /// non-positive flow rates are rejected.
    pub fn from_rows(rows: Vec<PumpCalibrationRow>) -> eyre::Result<Self> {
        let mut out = Self::new();
        for (idx, row) in rows.into_iter().enumerate() {
            let Some(pump) = Pump::from_name(row.pump.trim()) else {
                eyre::bail!(
                    "unknown pump '{}' in calibration row {} (expected media|waste|alt_media)",
                    row.pump,
                    idx + 2
                );
            };
            if !row.ml_per_sec.is_finite() || row.ml_per_sec <= 0.0 {
                eyre::bail!("calibration for {pump}: ml_per_sec must be > 0");
            }
            if !row.bias_ml.is_finite() {
                eyre::bail!("calibration for {pump}: bias_ml must be finite");
            }
            if out.by_pump.contains_key(&pump) {
                eyre::bail!("duplicate calibration for pump {pump}");
            }
            out.insert(
                pump,
                PumpCalibration {
                    ml_per_sec: row.ml_per_sec,
                    bias_ml: row.bias_ml,
                },
            );
        }
        Ok(out)
    }
}

impl CalibrationGate for PumpCalibrations {
    fn has_calibration(&self, pump: Pump) -> bool {
        self.by_pump.contains_key(&pump)
    }
}

pub fn load_pump_calibrations_csv(path: &Path) -> eyre::Result<PumpCalibrations> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open pump calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["pump", "ml_per_sec", "bias_ml"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "pump calibration CSV must have headers 'pump,ml_per_sec,bias_ml', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<PumpCalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }

    PumpCalibrations::from_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_for_subtracts_bias_and_floors_at_zero() {
        let cal = PumpCalibration {
            ml_per_sec: 0.5,
            bias_ml: 0.1,
        };
        assert!((cal.seconds_for(1.1) - 2.0).abs() < 1e-12);
        assert_eq!(cal.seconds_for(0.05), 0.0);
    }
}
