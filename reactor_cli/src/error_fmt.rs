//! Human-readable error descriptions and structured JSON error formatting.

use reactor_core::error::{BuildError, ReactorError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingCalibration(pump) => format!(
                "What happened: The {pump} pump has no calibration, so the automation was not started.\nLikely causes: The calibration CSV is missing a '{pump}' row, or no CSV was given.\nHow to fix: Calibrate the {pump} pump and add it to the CSV passed via --calibration or [calibration] pumps."
            ),
            BuildError::ConflictingTarget => {
                "What happened: Both a raw and a normalized OD target were configured.\nLikely causes: target_od and target_normalized_od (or min/max pairs of both kinds) are set together.\nHow to fix: Keep only one kind of target in [automation].".to_string()
            }
            BuildError::MissingTarget => {
                "What happened: No OD target was configured.\nLikely causes: [automation] lacks target_od / target_normalized_od or its min/max thresholds.\nHow to fix: Add exactly one kind of target to [automation].".to_string()
            }
            BuildError::InvalidDomainValue { field, value } => format!(
                "What happened: {field} = {value} is outside its allowed range.\nLikely causes: A typo or a value in the wrong unit.\nHow to fix: Correct {field} in the config and rerun `reactor check`."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `reactor check`."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<ReactorError>() {
        return match re {
            ReactorError::Timeout => "What happened: A pump transfer did not finish in time.\nLikely causes: Empty media bottle, kinked tubing, or the scale stopped responding.\nHow to fix: Check the fluid path and scale, or raise scale.max_transfer_ms in the config.".to_string(),
            ReactorError::Cancelled => "What happened: The run was stopped before it finished.\nLikely causes: Ctrl-C or another stop request.\nHow to fix: Nothing to fix; start a new run when ready.".to_string(),
            ReactorError::MissingReading(kind) => format!(
                "What happened: The automation needed a {kind} reading that was not available.\nLikely causes: The readings CSV has no '{kind}' column or an empty cell.\nHow to fix: Provide {kind} values, or switch the automation to the signal you record."
            ),
            ReactorError::UnknownSetting(name) => format!(
                "What happened: '{name}' is not a setting of this automation.\nLikely causes: A typo, or a setting that belongs to another automation.\nHow to fix: Run `reactor settings` to list the available names."
            ),
            ReactorError::ReadOnlySetting(name) => format!(
                "What happened: '{name}' cannot be changed at runtime.\nLikely causes: The setting is published for inspection only.\nHow to fix: Change it in the config file and restart the automation."
            ),
            ReactorError::SettingType { name, expected } => format!(
                "What happened: '{name}' expects a {expected} value.\nLikely causes: The value in --set could not be used as a {expected}.\nHow to fix: Pass e.g. --set {name}=0.5."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("pump calibration csv must have headers") {
        return "Invalid headers in pump calibration CSV. Expected 'pump,ml_per_sec,bias_ml'."
            .to_string();
    }

    if lower.contains("readings csv") {
        return format!(
            "What happened: The readings file could not be used ({msg}).\nLikely causes: Wrong path, or columns other than od,normalized_od,temperature.\nHow to fix: Check the --readings file and its header row."
        );
    }

    if lower.starts_with("read config") || lower.starts_with("parse config") {
        return format!(
            "What happened: The configuration file could not be loaded ({msg}).\nLikely causes: Wrong --config path or a TOML syntax error.\nHow to fix: Fix the file and rerun `reactor check`."
        );
    }

    if lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `reactor check`."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 for rejected construction, 4 for a stopped run, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    if let Some(ReactorError::Cancelled) = err.downcast_ref::<ReactorError>() {
        return 4;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingCalibration(_) => "MissingCalibration",
            BuildError::ConflictingTarget => "ConflictingTarget",
            BuildError::MissingTarget => "MissingTarget",
            BuildError::InvalidDomainValue { .. } => "InvalidDomainValue",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    if let Some(re) = err.downcast_ref::<ReactorError>() {
        return match re {
            ReactorError::Executor(_) => "Executor",
            ReactorError::Timeout => "Timeout",
            ReactorError::Cancelled => "Cancelled",
            ReactorError::MissingReading(_) => "MissingReading",
            ReactorError::InvalidInput(_) => "InvalidInput",
            ReactorError::NotConverged { .. } => "NotConverged",
            ReactorError::UnknownSetting(_) => "UnknownSetting",
            ReactorError::ReadOnlySetting(_) => "ReadOnlySetting",
            ReactorError::SettingType { .. } => "SettingType",
        };
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let obj = match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingCalibration(pump)) => {
            json!({ "reason": reason_name(err), "details": { "pump": pump.name() }, "message": msg })
        }
        Some(BuildError::InvalidDomainValue { field, value }) => {
            json!({ "reason": reason_name(err), "details": { "field": field, "value": value }, "message": msg })
        }
        _ => json!({ "reason": reason_name(err), "message": msg }),
    };
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reactor_core::SignalKind;
    use reactor_traits::Pump;

    #[test]
    fn missing_calibration_names_the_pump() {
        let err = eyre::Report::new(BuildError::MissingCalibration(Pump::AltMedia));
        let text = humanize(&err);
        assert!(text.contains("alt_media pump has no calibration"));
        assert_eq!(exit_code_for_error(&err), 3);

        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "MissingCalibration");
        assert_eq!(v["details"]["pump"], "alt_media");
    }

    #[test]
    fn cancelled_run_has_its_own_exit_code() {
        let err = eyre::Report::new(ReactorError::Cancelled);
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("stopped"));
    }

    #[test]
    fn missing_reading_mentions_signal() {
        let err = eyre::Report::new(ReactorError::MissingReading(SignalKind::Temperature));
        assert!(humanize(&err).contains("temperature"));
        assert_eq!(exit_code_for_error(&err), 1);
    }

    #[test]
    fn untyped_errors_fall_back_to_generic_text() {
        let err = eyre::eyre!("disk on fire");
        let text = humanize(&err);
        assert!(text.starts_with("Something went wrong."));
        assert!(text.contains("disk on fire"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Error");
    }
}
