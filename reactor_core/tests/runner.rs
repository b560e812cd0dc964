use reactor_core::automations::{NaiveTurbidostat, NaiveTurbidostatParams};
use reactor_core::error::BuildError;
use reactor_core::{ChannelSink, DecisionEvent, Readings, RunOptions, RunSummary, run_cycles};
use reactor_hardware::SimulatedVial;
use reactor_traits::{ActuationExecutor, StopFlag};

fn naive() -> NaiveTurbidostat {
    NaiveTurbidostat::new(NaiveTurbidostatParams {
        target_od: 0.5,
        volume_ml: 1.0,
        duration_min: 30.0,
    })
    .unwrap()
}

fn executor(vial: &mut SimulatedVial) -> &mut (dyn ActuationExecutor + 'static) {
    vial
}

fn od(v: f64) -> Readings {
    Readings::default().with_od(v)
}

#[test]
fn runner_counts_cycles_events_and_skipped_errors() {
    let mut t = naive();
    let mut vial = SimulatedVial::new(14.0);
    let mut events: Vec<DecisionEvent> = Vec::new();
    // Third cycle has no OD: logged and skipped.
    let readings = vec![od(0.6), od(0.4), Readings::default(), od(0.7)];

    let summary = run_cycles(
        &mut t,
        executor(&mut vial),
        readings,
        &mut events,
        &StopFlag::new(),
        RunOptions::every(30.0),
    )
    .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            cycles: 4,
            events: 2,
            errors: 1
        }
    );
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].get("latest_od"), Some(0.7));
    assert_eq!(vial.history().len(), 2);
}

#[test]
fn runner_honours_max_cycles() {
    let mut t = naive();
    let mut vial = SimulatedVial::new(14.0);
    let mut events: Vec<DecisionEvent> = Vec::new();
    let opts = RunOptions {
        max_cycles: Some(2),
        ..RunOptions::every(30.0)
    };

    let summary = run_cycles(
        &mut t,
        executor(&mut vial),
        std::iter::repeat_n(od(0.9), 10),
        &mut events,
        &StopFlag::new(),
        opts,
    )
    .unwrap();

    assert_eq!(summary.cycles, 2);
    assert_eq!(events.len(), 2);
}

#[test]
fn runner_stops_before_next_cycle_when_requested() {
    let mut t = naive();
    let mut vial = SimulatedVial::new(14.0);
    let mut events: Vec<DecisionEvent> = Vec::new();
    let stop = StopFlag::new();
    stop.request_stop();

    let summary = run_cycles(
        &mut t,
        executor(&mut vial),
        vec![od(0.9), od(0.9)],
        &mut events,
        &stop,
        RunOptions::every(30.0),
    )
    .unwrap();

    assert_eq!(summary, RunSummary::default());
    assert!(vial.history().is_empty());
}

#[test]
fn runner_forwards_events_over_a_channel() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut sink = ChannelSink::new(tx);
    let mut t = naive();
    let mut vial = SimulatedVial::new(14.0);

    run_cycles(
        &mut t,
        executor(&mut vial),
        vec![od(0.9), od(0.1), od(0.8)],
        &mut sink,
        &StopFlag::new(),
        RunOptions::every(30.0),
    )
    .unwrap();
    drop(sink);

    let got: Vec<_> = rx.iter().map(|e| e.get("latest_od")).collect();
    assert_eq!(got, vec![Some(0.9), Some(0.8)]);
}

#[test]
fn runner_rejects_non_positive_cycle_length() {
    let mut t = naive();
    let mut vial = SimulatedVial::new(14.0);
    let mut events: Vec<DecisionEvent> = Vec::new();

    let err = run_cycles(
        &mut t,
        executor(&mut vial),
        vec![od(0.9)],
        &mut events,
        &StopFlag::new(),
        RunOptions::every(0.0),
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidDomainValue {
            field: "cycle_min",
            ..
        })
    ));
}
