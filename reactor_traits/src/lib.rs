//! Collaborator seams for the bioreactor automations.
//!
//! Everything the decision engine talks to but does not own lives behind a
//! trait here: the pump calibration store, the dosing executor, the heater,
//! the LEDs, and (for weight-verified dosing) the scale and pump drivers.
//! Trait errors are `Box<dyn Error + Send + Sync>` so implementations stay
//! free to use their own error types; `reactor_core` maps them to typed errors.

pub mod clock;
pub mod stop;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use stop::StopFlag;

use std::fmt;
use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Named pumps attached to a vial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pump {
    Media,
    Waste,
    AltMedia,
}

impl Pump {
    pub const ALL: [Pump; 3] = [Pump::Media, Pump::Waste, Pump::AltMedia];

    /// Key used in the calibration store.
    pub fn name(self) -> &'static str {
        match self {
            Pump::Media => "media",
            Pump::Waste => "waste",
            Pump::AltMedia => "alt_media",
        }
    }

    /// Key used in dose requests and reports.
    pub fn volume_key(self) -> &'static str {
        match self {
            Pump::Media => "media_ml",
            Pump::Waste => "waste_ml",
            Pump::AltMedia => "alt_media_ml",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == s)
    }
}

impl fmt::Display for Pump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Volumes (mL) per pump. Used both for requests and for what was actually moved.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DoseVolumes {
    pub media_ml: f64,
    pub alt_media_ml: f64,
    pub waste_ml: f64,
}

impl DoseVolumes {
    /// Exchange `ml` of media for vial contents.
    pub fn exchange_media(ml: f64) -> Self {
        Self {
            media_ml: ml,
            waste_ml: ml,
            ..Self::default()
        }
    }

    /// Exchange `ml` of alternate media for vial contents.
    pub fn exchange_alt_media(ml: f64) -> Self {
        Self {
            alt_media_ml: ml,
            waste_ml: ml,
            ..Self::default()
        }
    }

    pub fn get(&self, pump: Pump) -> f64 {
        match pump {
            Pump::Media => self.media_ml,
            Pump::Waste => self.waste_ml,
            Pump::AltMedia => self.alt_media_ml,
        }
    }

    pub fn set(&mut self, pump: Pump, ml: f64) {
        match pump {
            Pump::Media => self.media_ml = ml,
            Pump::Waste => self.waste_ml = ml,
            Pump::AltMedia => self.alt_media_ml = ml,
        }
    }

    pub fn is_empty(&self) -> bool {
        Pump::ALL.iter().all(|p| self.get(*p) <= 0.0)
    }
}

/// Answers whether a pump has a calibration on file.
pub trait CalibrationGate {
    fn has_calibration(&self, pump: Pump) -> bool;
}

/// Performs dilutions and reports the volume actually moved per pump.
///
/// Implementations may block for the physical duration of the dose. Long
/// transfers must poll `stop` and return the partial volume moved so far
/// instead of failing.
pub trait ActuationExecutor {
    fn execute(&mut self, request: &DoseVolumes, stop: &StopFlag) -> Result<DoseVolumes, BoxError>;

    /// Current fraction of alternate media in the vial, tracked from executed doses.
    fn alt_media_fraction(&self) -> f64;

    /// Working volume of the vial in mL.
    fn vial_volume_ml(&self) -> f64;
}

/// PWM heater driven by duty-cycle deltas.
pub trait Heater {
    /// Current duty cycle in percent.
    fn duty_cycle(&self) -> f64;

    /// True while another job holds the heater PWM.
    fn is_locked(&self) -> bool;

    /// Apply a duty-cycle delta, returning the resulting duty cycle.
    fn apply_delta(&mut self, delta: f64) -> Result<f64, BoxError>;
}

/// LED channels on the reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedChannel {
    A,
    B,
    C,
    D,
}

impl fmt::Display for LedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LedChannel::A => "A",
            LedChannel::B => "B",
            LedChannel::C => "C",
            LedChannel::D => "D",
        };
        f.write_str(s)
    }
}

pub trait LedDriver {
    fn set_intensity(&mut self, channel: LedChannel, percent: f64) -> Result<(), BoxError>;
}

/// Weighing scale under the vial, reporting grams.
pub trait Scale {
    fn read_grams(&mut self, timeout: Duration) -> Result<f64, BoxError>;
}

/// Continuous-run pump control used by weight-verified dosing.
pub trait PumpDriver {
    fn start(&mut self, pump: Pump) -> Result<(), BoxError>;
    fn stop(&mut self, pump: Pump) -> Result<(), BoxError>;
}
