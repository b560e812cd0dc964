//! Actuation backends for the reactor: a simulated vial, a serial balance,
//! and a dosing executor that verifies every transfer by weight.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod error;
pub mod scale;
pub mod sim;
pub mod util;
pub mod vial;
pub mod weight;

pub use error::HwError;
pub use scale::{SerialScale, parse_weight_line};
pub use sim::{
    SimulatedHeater, SimulatedLeds, SimulatedPumps, SimulatedRig, SimulatedScale, SimulatedVial,
};
pub use vial::VialLedger;
pub use weight::{WeightSettings, WeightVerifiedExecutor};
