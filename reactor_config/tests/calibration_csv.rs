use std::fs;
use std::io::Write;

use reactor_config::{ReadingRow, load_pump_calibrations_csv, load_readings_csv};
use reactor_traits::{CalibrationGate, Pump};
use rstest::rstest;
use tempfile::NamedTempFile;

fn write_tmp(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("tmp file");
    f.write_all(contents.as_bytes()).expect("write");
    f
}

#[test]
fn loads_pump_calibrations_and_answers_gate_queries() {
    let f = write_tmp("pump,ml_per_sec,bias_ml\nmedia,0.52,0.0\nwaste,0.61,0.01\n");
    let cals = load_pump_calibrations_csv(f.path()).expect("load");
    assert_eq!(cals.len(), 2);
    assert!(cals.has_calibration(Pump::Media));
    assert!(cals.has_calibration(Pump::Waste));
    assert!(!cals.has_calibration(Pump::AltMedia));
    let waste = cals.get(Pump::Waste).expect("waste calibration");
    assert_eq!(waste.ml_per_sec, 0.61);
    assert_eq!(waste.bias_ml, 0.01);
}

#[test]
fn rejects_wrong_headers() {
    let f = write_tmp("name,rate\nmedia,0.5\n");
    let err = load_pump_calibrations_csv(f.path()).expect_err("bad headers");
    assert!(format!("{err}").contains("must have headers 'pump,ml_per_sec,bias_ml'"));
}

#[rstest]
#[case("pump,ml_per_sec,bias_ml\nacid,0.5,0.0\n", "unknown pump 'acid'")]
#[case("pump,ml_per_sec,bias_ml\nmedia,0.0,0.0\n", "ml_per_sec must be > 0")]
#[case(
    "pump,ml_per_sec,bias_ml\nmedia,0.5,0.0\nmedia,0.6,0.0\n",
    "duplicate calibration for pump media"
)]
#[case("pump,ml_per_sec,bias_ml\nmedia,fast,0.0\n", "invalid CSV row 2")]
fn rejects_bad_rows(#[case] csv: &str, #[case] needle: &str) {
    let f = write_tmp(csv);
    let err = load_pump_calibrations_csv(f.path()).expect_err("bad rows");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "expected '{needle}' in '{msg}'");
}

#[test]
fn missing_file_is_reported_with_path() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("nope.csv");
    let err = load_pump_calibrations_csv(&path).expect_err("missing file");
    assert!(format!("{err}").contains("open pump calibration CSV"));
}

#[test]
fn loads_readings_with_partial_columns_and_blanks() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("readings.csv");
    fs::write(&path, "od,temperature\n0.61,\n0.55,30.1\n").expect("write");
    let rows = load_readings_csv(&path).expect("load");
    assert_eq!(
        rows,
        vec![
            ReadingRow {
                od: Some(0.61),
                normalized_od: None,
                temperature: None,
            },
            ReadingRow {
                od: Some(0.55),
                normalized_od: None,
                temperature: Some(30.1),
            },
        ]
    );
}

#[test]
fn readings_reject_unknown_columns() {
    let f = write_tmp("od,ph\n0.5,7.0\n");
    let err = load_readings_csv(f.path()).expect_err("unknown column");
    assert!(format!("{err}").contains("unknown column 'ph'"));
}
