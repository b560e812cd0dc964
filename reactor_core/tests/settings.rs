use reactor_core::automations::{
    AdaptedTurbidostat, AdaptedTurbidostatParams, Automation, Cycle, LightCycle,
    LightCycleParams, NaiveTurbidostat, NaiveTurbidostatParams, PidTurbidostat,
    PidTurbidostatParams,
};
use reactor_core::error::ReactorError;
use reactor_core::{Gains, Readings, SetpointPolicy, SettingUpdate, SettingValue};
use reactor_hardware::SimulatedVial;
use reactor_traits::{CalibrationGate, Pump};
use rstest::rstest;

struct AllCalibrated;

impl CalibrationGate for AllCalibrated {
    fn has_calibration(&self, _pump: Pump) -> bool {
        true
    }
}

fn raw_pid() -> PidTurbidostat {
    PidTurbidostat::new(
        PidTurbidostatParams {
            target_od: Some(1.0),
            target_normalized_od: None,
            duration_min: 30.0,
            gains: Gains::new(2.0, 0.1, 0.5),
            setpoint_policy: SetpointPolicy::KeepState,
            vial_volume_ml: 14.0,
        },
        &AllCalibrated,
    )
    .unwrap()
}

fn reactor_error(err: &eyre::Report) -> &ReactorError {
    err.downcast_ref::<ReactorError>()
        .unwrap_or_else(|| panic!("expected ReactorError, got: {err:?}"))
}

#[test]
fn target_change_applies_without_restart() {
    let mut t = raw_pid();
    let mut vial = SimulatedVial::new(14.0);

    let update = t
        .apply_setting("target_od", SettingValue::Float(2.0))
        .unwrap();
    assert_eq!(update, SettingUpdate::Applied);
    assert_eq!(t.target(), 2.0);
    assert_eq!(t.controller().setpoint(), 2.0);

    // 1.5 was a trigger under the old target, not under the new one.
    let cycle = Cycle::new(Readings::default().with_od(1.5), 30.0);
    assert!(t.decide(&cycle, &mut vial).unwrap().is_none());
}

#[test]
fn setting_the_other_dimension_is_ignored() {
    let mut t = raw_pid();
    let update = t
        .apply_setting("target_normalized_od", SettingValue::Float(0.4))
        .unwrap();
    assert_eq!(update, SettingUpdate::Ignored);
    assert_eq!(t.target(), 1.0);
    assert_eq!(t.controller().setpoint(), 1.0);
}

#[test]
fn adapted_threshold_in_other_dimension_is_ignored() {
    let mut t = AdaptedTurbidostat::new(
        AdaptedTurbidostatParams::normalized(0.5, 0.6, 1.0),
        &AllCalibrated,
    )
    .unwrap();

    assert_eq!(
        t.apply_setting("max_od", SettingValue::Float(3.0)).unwrap(),
        SettingUpdate::Ignored
    );
    assert_eq!(
        t.apply_setting("max_normalized_od", SettingValue::Float(0.7))
            .unwrap(),
        SettingUpdate::Applied
    );
    assert_eq!(t.doser().thresholds().max, 0.7);

    // min must stay below max.
    assert_eq!(
        t.apply_setting("min_normalized_od", SettingValue::Float(0.9))
            .unwrap(),
        SettingUpdate::Ignored
    );
    assert_eq!(t.doser().thresholds().min, 0.5);
}

#[test]
fn adapted_volume_change_resets_compensation() {
    let mut t = AdaptedTurbidostat::new(
        AdaptedTurbidostatParams::normalized(0.5, 0.6, 1.0),
        &AllCalibrated,
    )
    .unwrap();
    let mut vial = SimulatedVial::new(14.0);
    let hot = Cycle::new(Readings::default().with_normalized_od(0.7), 30.0);
    t.decide(&hot, &mut vial).unwrap();
    t.decide(&hot, &mut vial).unwrap();
    assert!((t.doser().volume_ml() - 1.1).abs() < 1e-9);

    t.apply_setting("volume", SettingValue::Float(0.5)).unwrap();
    assert_eq!(t.doser().volume_ml(), 0.5);
    assert_eq!(t.doser().nominal_volume_ml(), 0.5);
}

#[rstest]
#[case("use_normalized_od", SettingValue::Bool(false))]
#[case("use_normalized_od", SettingValue::Bool(true))]
fn read_only_settings_are_rejected(#[case] name: &str, #[case] value: SettingValue) {
    let mut t = AdaptedTurbidostat::new(
        AdaptedTurbidostatParams::normalized(0.5, 0.6, 1.0),
        &AllCalibrated,
    )
    .unwrap();
    let err = t.apply_setting(name, value).unwrap_err();
    assert_eq!(
        reactor_error(&err),
        &ReactorError::ReadOnlySetting(name.to_string())
    );
    assert!(t.use_normalized_od());
}

#[test]
fn light_cycle_duration_is_read_only() {
    let mut l = LightCycle::new(LightCycleParams {
        max_light_intensity: 50.0,
        duration_min: 60.0,
    })
    .unwrap();
    let err = l
        .apply_setting("duration", SettingValue::Float(30.0))
        .unwrap_err();
    assert!(matches!(
        reactor_error(&err),
        ReactorError::ReadOnlySetting(_)
    ));
    assert_eq!(
        l.apply_setting("max_light_intensity", SettingValue::Float(80.0))
            .unwrap(),
        SettingUpdate::Applied
    );
    let err = l
        .apply_setting("max_light_intensity", SettingValue::Float(120.0))
        .unwrap_err();
    assert!(matches!(
        reactor_error(&err),
        ReactorError::InvalidInput(_)
    ));
}

#[test]
fn unknown_and_mistyped_settings_are_errors() {
    let mut t = raw_pid();
    let err = t
        .apply_setting("Kp", SettingValue::Float(1.0))
        .unwrap_err();
    assert_eq!(
        reactor_error(&err),
        &ReactorError::UnknownSetting("Kp".into())
    );

    let err = t
        .apply_setting("target_od", SettingValue::Bool(true))
        .unwrap_err();
    assert!(matches!(
        reactor_error(&err),
        ReactorError::SettingType { expected: "float", .. }
    ));

    let err = t
        .apply_setting("target_od", SettingValue::Float(-1.0))
        .unwrap_err();
    assert!(matches!(
        reactor_error(&err),
        ReactorError::InvalidInput(_)
    ));
    assert_eq!(t.target(), 1.0);
}

#[test]
fn published_settings_list_settable_flags() {
    let t = AdaptedTurbidostat::new(
        AdaptedTurbidostatParams::raw(1.0, 2.0, 0.5),
        &AllCalibrated,
    )
    .unwrap();
    let settings = t.published_settings();
    let flag = settings
        .iter()
        .find(|s| s.name == "use_normalized_od")
        .unwrap();
    assert!(!flag.settable);
    assert!(
        settings
            .iter()
            .filter(|s| s.name != "use_normalized_od")
            .all(|s| s.settable)
    );
}

#[test]
fn naive_turbidostat_publishes_volume_and_duration_as_settable() {
    let mut t = NaiveTurbidostat::new(NaiveTurbidostatParams {
        target_od: 1.0,
        volume_ml: 1.0,
        duration_min: 20.0,
    })
    .unwrap();
    let names: Vec<_> = t
        .published_settings()
        .iter()
        .filter(|s| s.settable)
        .map(|s| s.name)
        .collect();
    assert_eq!(names, ["target_od", "volume", "duration"]);

    assert_eq!(
        t.apply_setting("volume", SettingValue::Float(0.25)).unwrap(),
        SettingUpdate::Applied
    );
    let mut vial = SimulatedVial::new(14.0);
    let cycle = Cycle::new(Readings::default().with_od(1.5), 20.0);
    let event = t.decide(&cycle, &mut vial).unwrap().unwrap();
    assert_eq!(event.get("volume"), Some(0.25));
}
