//! Drives an automation over a stream of per-cycle readings.
//!
//! The runner stands in for the scheduler: one `decide` per reading, events
//! forwarded to a sink, recoverable errors logged and counted. It never
//! sleeps; pacing belongs to whoever produces the readings.

use reactor_traits::StopFlag;

use crate::automations::{Automation, Cycle};
use crate::error::{BuildError, ReactorError, Result};
use crate::event::EventSink;
use crate::readings::Readings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    /// Minutes between cycles, handed to every decision as elapsed time.
    pub cycle_min: f64,
    /// Minutes until the next scheduled run, when the scheduler knows it.
    pub time_to_next_run_min: Option<f64>,
    /// Stop after this many cycles.
    pub max_cycles: Option<usize>,
}

impl RunOptions {
    pub fn every(cycle_min: f64) -> Self {
        Self {
            cycle_min,
            time_to_next_run_min: None,
            max_cycles: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub events: usize,
    pub errors: usize,
}

/// Errors that end the run instead of being skipped: nothing later cycles
/// could fix.
fn is_fatal(e: &eyre::Report) -> bool {
    e.downcast_ref::<BuildError>().is_some()
        || matches!(e.downcast_ref::<ReactorError>(), Some(ReactorError::Cancelled))
}

/// Run `automation` once per item of `readings`.
///
/// Stops early when `stop` is raised (checked before every cycle) or after
/// `max_cycles`. A failing cycle is logged and the run continues with the
/// next one, except for cancellation and construction errors, which are
/// returned.
pub fn run_cycles<A, I>(
    automation: &mut A,
    actuator: &mut A::Actuator,
    readings: I,
    sink: &mut dyn EventSink,
    stop: &StopFlag,
    opts: RunOptions,
) -> Result<RunSummary>
where
    A: Automation + ?Sized,
    I: IntoIterator<Item = Readings>,
{
    if !opts.cycle_min.is_finite() || opts.cycle_min <= 0.0 {
        return Err(eyre::Report::new(BuildError::InvalidDomainValue {
            field: "cycle_min",
            value: opts.cycle_min,
        }));
    }
    let mut summary = RunSummary::default();
    for readings in readings {
        if stop.is_stop_requested() {
            tracing::info!(cycles = summary.cycles, "stop requested; ending run");
            break;
        }
        if opts.max_cycles.is_some_and(|max| summary.cycles >= max) {
            break;
        }
        let cycle = Cycle {
            readings,
            elapsed_min: opts.cycle_min,
            time_to_next_run_min: opts.time_to_next_run_min,
            stop: stop.clone(),
        };
        summary.cycles += 1;
        match automation.decide(&cycle, actuator) {
            Ok(Some(event)) => {
                summary.events += 1;
                sink.emit(&event);
            }
            Ok(None) => {
                tracing::debug!(
                    cycle = summary.cycles,
                    automation = automation.name(),
                    "no action"
                );
            }
            Err(e) if is_fatal(&e) => return Err(e),
            Err(e) => {
                summary.errors += 1;
                tracing::error!(
                    cycle = summary.cycles,
                    automation = automation.name(),
                    error = %e,
                    "cycle failed"
                );
            }
        }
    }
    tracing::info!(
        cycles = summary.cycles,
        events = summary.events,
        errors = summary.errors,
        "run finished"
    );
    Ok(summary)
}
