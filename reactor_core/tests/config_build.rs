use reactor_config::{PumpCalibration, PumpCalibrations, ReadingRow, load_toml};
use reactor_core::error::BuildError;
use reactor_core::{
    ConfiguredAutomation, Cycle, Readings, SetpointPolicy, SignalKind, build_automation,
};
use reactor_hardware::{SimulatedHeater, SimulatedVial};
use reactor_traits::{ActuationExecutor, Heater, Pump};
use rstest::rstest;

fn calibrated(pumps: &[Pump]) -> PumpCalibrations {
    let mut cals = PumpCalibrations::new();
    for p in pumps {
        cals.insert(
            *p,
            PumpCalibration {
                ml_per_sec: 0.5,
                bias_ml: 0.0,
            },
        );
    }
    cals
}

#[rstest]
#[case("kind = \"pid_turbidostat\"\ntarget_od = 1.0", "pid_turbidostat")]
#[case(
    "kind = \"adapted_turbidostat\"\nvolume = 0.5\nmin_normalized_od = 0.5\nmax_normalized_od = 0.6",
    "adapted_turbidostat"
)]
#[case("kind = \"naive_turbidostat\"\ntarget_od = 0.5", "naive_turbidostat")]
#[case("kind = \"chemostat\"\nvolume = 1.0", "chemostat")]
#[case(
    "kind = \"chemostat_with_inducer\"\nvolume = 1.0\ntarget_inducer_fraction = 0.2",
    "chemostat_with_inducer"
)]
#[case("kind = \"switching_dosing\"\ntarget_od = 1.0", "switching_dosing")]
fn dosing_automations_build_from_config(#[case] body: &str, #[case] name: &str) {
    let cfg = load_toml(&format!("[automation]\n{body}\n")).unwrap();
    cfg.validate().unwrap();
    let built = build_automation(&cfg, &calibrated(&Pump::ALL)).unwrap();
    assert_eq!(built.name(), name);
    assert!(matches!(built, ConfiguredAutomation::Dosing(_)));
}

#[test]
fn heater_and_led_automations_need_no_pump_calibration() {
    let cfg = load_toml(
        r#"
[automation]
kind = "temperature_gradient"
start_temperature = 25.0
final_target_temperature = 35.0
time_to_reach = 60.0
"#,
    )
    .unwrap();
    let built = build_automation(&cfg, &PumpCalibrations::new()).unwrap();
    let ConfiguredAutomation::Heater(mut gradient) = built else {
        panic!("expected a heater automation");
    };
    let mut heater = SimulatedHeater::new(0.0);
    let cycle = Cycle::new(Readings::default().with_temperature(24.0), 1.5);
    let event = gradient
        .decide(&cycle, &mut heater as &mut (dyn Heater + 'static))
        .unwrap()
        .unwrap();
    assert!(event.get("delta_dc").unwrap() > 0.0);

    let cfg = load_toml("[automation]\nkind = \"light_cycle\"\nmax_light_intensity = 50.0\n")
        .unwrap();
    let built = build_automation(&cfg, &PumpCalibrations::new()).unwrap();
    assert!(matches!(built, ConfiguredAutomation::Led(_)));
    assert_eq!(built.name(), "light_cycle");
}

#[test]
fn seeded_random_profile_builds_reproducibly() {
    let toml = r#"
[automation]
kind = "random_profile"
min_temperature = 28.0
max_temperature = 32.0
seed = 11
"#;
    let targets = || {
        let cfg = load_toml(toml).unwrap();
        cfg.validate().unwrap();
        let built = build_automation(&cfg, &PumpCalibrations::new()).unwrap();
        assert_eq!(built.name(), "random_profile");
        let ConfiguredAutomation::Heater(mut profile) = built else {
            panic!("expected a heater automation");
        };
        let mut heater = SimulatedHeater::new(0.0);
        let cycle = Cycle::new(Readings::default().with_temperature(30.0), 1.5);
        (0..5)
            .map(|_| {
                profile
                    .decide(&cycle, &mut heater as &mut (dyn Heater + 'static))
                    .unwrap()
                    .unwrap()
                    .get("target_temperature")
                    .unwrap()
            })
            .collect::<Vec<_>>()
    };
    let first = targets();
    assert!(first.iter().all(|t| (28.0..32.0).contains(t)));
    assert_eq!(first, targets());
}

#[test]
fn missing_calibration_surfaces_as_build_error() {
    let cfg = load_toml("[automation]\nkind = \"chemostat\"\nvolume = 1.0\n").unwrap();
    let err = build_automation(&cfg, &calibrated(&[Pump::Media])).unwrap_err();
    assert_eq!(
        err.downcast_ref::<BuildError>(),
        Some(&BuildError::MissingCalibration(Pump::Waste))
    );
}

#[test]
fn pid_turbidostat_uses_configured_gains_and_vial() {
    let cfg = load_toml(
        r#"
[bioreactor]
max_volume_ml = 10.0

[pid.turbidostat]
Kp = 100.0
setpoint_policy = "reset"

[automation]
kind = "pid_turbidostat"
target_od = 1.0
"#,
    )
    .unwrap();
    let ConfiguredAutomation::Dosing(mut pid) =
        build_automation(&cfg, &calibrated(&Pump::ALL)).unwrap()
    else {
        panic!("expected a dosing automation");
    };
    let mut vial = SimulatedVial::new(10.0);
    let cycle = Cycle::new(Readings::default().with_od(2.0), 30.0);
    let event = pid
        .decide(&cycle, &mut vial as &mut (dyn ActuationExecutor + 'static))
        .unwrap()
        .unwrap();
    // Output is capped at the vial volume.
    assert_eq!(event.get("volume"), Some(10.0));
    assert_eq!(
        SetpointPolicy::from(cfg.pid.turbidostat.setpoint_policy),
        SetpointPolicy::ResetState
    );
}

#[test]
fn reading_rows_map_to_readings() {
    let row = ReadingRow {
        od: Some(0.4),
        normalized_od: None,
        temperature: Some(30.5),
    };
    let r = Readings::from(&row);
    assert_eq!(r.require(SignalKind::Od).unwrap(), 0.4);
    assert_eq!(r.require(SignalKind::Temperature).unwrap(), 30.5);
    assert!(r.get(SignalKind::NormalizedOd).is_none());
}

#[test]
fn runtime_setting_reaches_boxed_automation() {
    let cfg = load_toml("[automation]\nkind = \"naive_turbidostat\"\ntarget_od = 0.5\n").unwrap();
    let mut built = build_automation(&cfg, &PumpCalibrations::new()).unwrap();
    built
        .apply_setting("target_od", "0.8".parse().unwrap())
        .unwrap();
    let ConfiguredAutomation::Dosing(mut naive) = built else {
        panic!("expected a dosing automation");
    };
    let mut vial = SimulatedVial::new(14.0);
    let cycle = Cycle::new(Readings::default().with_od(0.7), 30.0);
    assert!(
        naive
            .decide(&cycle, &mut vial as &mut (dyn ActuationExecutor + 'static))
            .unwrap()
            .is_none()
    );
}
