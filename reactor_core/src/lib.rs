#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control-decision engine for a small continuous-culture bioreactor
//! (hardware-agnostic).
//!
//! Every decision is a pure function of the controller state, the readings
//! handed in for the cycle, and the elapsed time the caller supplies. Pumps,
//! heater and LEDs are reached only through `reactor_traits`.
//!
//! ## Architecture
//!
//! - **Control**: clamped PID (`pid`), hysteresis doser with volume
//!   compensation (`hysteresis`), linear setpoint ramp (`ramp`), and
//!   two-liquid exchange math (`mixture`)
//! - **Automations**: turbidostats, chemostats, switching dosing, temperature
//!   gradient and light cycle composed from the above (`automations`)
//! - **Events**: one `DecisionEvent` per decision that acted (`event`)
//! - **Settings**: published, typed runtime settings (`settings`)
//! - **Runner**: drive an automation over a stream of readings (`runner`)

pub mod automations;
pub mod conversions;
pub mod error;
pub mod event;
pub mod hw_error;
pub mod hysteresis;
pub mod mixture;
pub mod pid;
pub mod ramp;
pub mod readings;
pub mod runner;
pub mod settings;

pub use automations::{Automation, Cycle, OdSignal, require_calibration};
pub use conversions::{ConfiguredAutomation, build_automation};
pub use error::{BuildError, ReactorError, Report, Result};
pub use event::{ChannelSink, DecisionEvent, EventKind, EventSink, TracingSink};
pub use hysteresis::{DoserPhase, HysteresisDecision, HysteresisDoser, Thresholds};
pub use mixture::{Liquid, SwitchingConfig, SwitchingDoser, compute_exchange_volume};
pub use pid::{FeedbackController, Gains, OutputLimits, SetpointPolicy};
pub use ramp::{RampConfig, RampStep, RampedSetpointController};
pub use readings::{Readings, SensorReading, SignalKind};
pub use runner::{RunOptions, RunSummary, run_cycles};
pub use settings::{Datatype, PublishedSetting, SettingUpdate, SettingValue};
