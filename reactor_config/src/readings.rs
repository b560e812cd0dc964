//! Recorded sensor readings, one row per scheduling cycle.
//!
//! Headers are any subset of `od,normalized_od,temperature`; empty cells mean
//! the signal was not available that cycle.
use serde::Deserialize;
use std::path::Path;

const KNOWN_HEADERS: [&str; 3] = ["od", "normalized_od", "temperature"];

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct ReadingRow {
    #[serde(default)]
    pub od: Option<f64>,
    #[serde(default)]
    pub normalized_od: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

pub fn load_readings_csv(path: &Path) -> eyre::Result<Vec<ReadingRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open readings CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    if let Some(unknown) = headers.iter().find(|h| !KNOWN_HEADERS.contains(h)) {
        eyre::bail!(
            "readings CSV has unknown column '{unknown}' (expected any of {})",
            KNOWN_HEADERS.join(",")
        );
    }
    if headers.is_empty() {
        eyre::bail!("readings CSV has no columns");
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ReadingRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    Ok(rows)
}
