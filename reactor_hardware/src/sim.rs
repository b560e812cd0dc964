//! Simulated reactor actuators for replay runs and tests.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use reactor_traits::{
    ActuationExecutor, BoxError, DoseVolumes, Heater, LedChannel, LedDriver, Pump, PumpDriver,
    Scale, StopFlag,
};

use crate::error::HwError;
use crate::vial::VialLedger;

/// Most recent doses kept by [`SimulatedVial::history`].
pub const HISTORY_CAP: usize = 1024;

/// Dosing executor for a simulated vial.
///
/// Requested volumes can be quantized to a pump resolution so the reported
/// volume differs from the request, like a real pump would.
#[derive(Debug, Clone)]
pub struct SimulatedVial {
    ledger: VialLedger,
    resolution_ml: Option<f64>,
    history: Vec<DoseVolumes>,
}

impl SimulatedVial {
    pub fn new(volume_ml: f64) -> Self {
        Self {
            ledger: VialLedger::new(volume_ml),
            resolution_ml: None,
            history: Vec::new(),
        }
    }

    /// Start from a vial already holding some alternate media.
    pub fn with_alt_media_fraction(mut self, fraction: f64) -> Self {
        self.ledger = VialLedger::with_fraction(self.ledger.volume_ml(), fraction);
        self
    }

    /// Round every moved volume to a multiple of `ml`.
    pub fn with_resolution(mut self, ml: f64) -> Self {
        self.resolution_ml = (ml > 0.0).then_some(ml);
        self
    }

    /// The last [`HISTORY_CAP`] doses actually performed, oldest first.
    /// Cumulative volumes stay available through [`Self::totals`].
    pub fn history(&self) -> &[DoseVolumes] {
        &self.history
    }

    pub fn totals(&self) -> DoseVolumes {
        self.ledger.totals()
    }

    fn quantize(&self, ml: f64) -> f64 {
        match self.resolution_ml {
            Some(step) => (ml / step).round() * step,
            None => ml,
        }
    }
}

impl ActuationExecutor for SimulatedVial {
    fn execute(&mut self, request: &DoseVolumes, stop: &StopFlag) -> Result<DoseVolumes, BoxError> {
        for pump in Pump::ALL {
            let ml = request.get(pump);
            if !ml.is_finite() || ml < 0.0 {
                return Err(Box::new(HwError::InvalidRequest(format!(
                    "{} = {ml}",
                    pump.volume_key()
                ))));
            }
        }
        let mut moved = DoseVolumes::default();
        if stop.is_stop_requested() {
            tracing::debug!("stop requested before dose; nothing moved");
            return Ok(moved);
        }
        for pump in [Pump::Media, Pump::AltMedia, Pump::Waste] {
            moved.set(pump, self.quantize(request.get(pump)));
        }
        self.ledger.record_all(&moved);
        if self.history.len() == HISTORY_CAP {
            self.history.remove(0);
        }
        self.history.push(moved);
        tracing::debug!(
            media_ml = moved.media_ml,
            alt_media_ml = moved.alt_media_ml,
            waste_ml = moved.waste_ml,
            alt_media_fraction = self.ledger.alt_media_fraction(),
            "simulated dose"
        );
        Ok(moved)
    }

    fn alt_media_fraction(&self) -> f64 {
        self.ledger.alt_media_fraction()
    }

    fn vial_volume_ml(&self) -> f64 {
        self.ledger.volume_ml()
    }
}

/// Heater whose duty cycle is clamped to 0..=100 %.
#[derive(Debug, Clone, Default)]
pub struct SimulatedHeater {
    duty: f64,
    locked: bool,
}

impl SimulatedHeater {
    pub fn new(duty: f64) -> Self {
        Self {
            duty: duty.clamp(0.0, 100.0),
            locked: false,
        }
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }
}

impl Heater for SimulatedHeater {
    fn duty_cycle(&self) -> f64 {
        self.duty
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn apply_delta(&mut self, delta: f64) -> Result<f64, BoxError> {
        if !delta.is_finite() {
            return Err(Box::new(HwError::InvalidRequest(format!(
                "delta_dc = {delta}"
            ))));
        }
        self.duty = (self.duty + delta).clamp(0.0, 100.0);
        Ok(self.duty)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedLeds {
    intensities: HashMap<LedChannel, f64>,
}

impl SimulatedLeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intensity(&self, channel: LedChannel) -> f64 {
        self.intensities.get(&channel).copied().unwrap_or(0.0)
    }
}

impl LedDriver for SimulatedLeds {
    fn set_intensity(&mut self, channel: LedChannel, percent: f64) -> Result<(), BoxError> {
        self.intensities.insert(channel, percent.clamp(0.0, 100.0));
        Ok(())
    }
}

#[derive(Debug)]
struct RigState {
    grams: f64,
    running: Option<Pump>,
    grams_per_read: f64,
    failures_remaining: u32,
    reads: u64,
}

/// A scale and pump pair sharing one simulated vial on a balance.
///
/// While a pump runs, every scale read moves the weight by `grams_per_read`
/// (up for media/alt-media, down for waste). Read failures can be injected.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    state: Rc<RefCell<RigState>>,
}

impl SimulatedRig {
    pub fn new(initial_grams: f64, grams_per_read: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState {
                grams: initial_grams,
                running: None,
                grams_per_read,
                failures_remaining: 0,
                reads: 0,
            })),
        }
    }

    /// Make the next `n` scale reads fail.
    pub fn fail_next_reads(&self, n: u32) {
        self.state.borrow_mut().failures_remaining = n;
    }

    pub fn grams(&self) -> f64 {
        self.state.borrow().grams
    }

    pub fn running(&self) -> Option<Pump> {
        self.state.borrow().running
    }

    pub fn reads(&self) -> u64 {
        self.state.borrow().reads
    }

    pub fn scale(&self) -> SimulatedScale {
        SimulatedScale { rig: self.clone() }
    }

    pub fn pumps(&self) -> SimulatedPumps {
        SimulatedPumps { rig: self.clone() }
    }
}

pub struct SimulatedScale {
    rig: SimulatedRig,
}

impl Scale for SimulatedScale {
    fn read_grams(&mut self, _timeout: Duration) -> Result<f64, BoxError> {
        let mut st = self.rig.state.borrow_mut();
        st.reads += 1;
        if st.failures_remaining > 0 {
            st.failures_remaining -= 1;
            return Err(Box::new(HwError::Parse("garbled".into())));
        }
        match st.running {
            Some(Pump::Waste) => st.grams -= st.grams_per_read,
            Some(_) => st.grams += st.grams_per_read,
            None => {}
        }
        Ok(st.grams)
    }
}

pub struct SimulatedPumps {
    rig: SimulatedRig,
}

impl PumpDriver for SimulatedPumps {
    fn start(&mut self, pump: Pump) -> Result<(), BoxError> {
        self.rig.state.borrow_mut().running = Some(pump);
        Ok(())
    }

    fn stop(&mut self, _pump: Pump) -> Result<(), BoxError> {
        self.rig.state.borrow_mut().running = None;
        Ok(())
    }
}
