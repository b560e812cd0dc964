//! Dosing executor that runs each pump until the scale confirms the volume.
//!
//! Media density is taken as 1 g/mL. Pumps run one at a time in the order
//! media, alt-media, waste so the vial never drops below its working volume.
use std::time::Duration;

use reactor_traits::{
    ActuationExecutor, BoxError, Clock, DoseVolumes, MonotonicClock, Pump, PumpDriver, Scale,
    StopFlag,
};

use crate::error::{HwError, Result};
use crate::util::retry_with_backoff;
use crate::vial::VialLedger;

#[derive(Debug, Clone, Copy)]
pub struct WeightSettings {
    /// Delay between scale polls while a pump runs.
    pub poll: Duration,
    /// Timeout handed to each scale read.
    pub read_timeout: Duration,
    /// Hard ceiling on a single pump transfer.
    pub max_transfer: Duration,
    pub max_read_retries: u32,
    pub backoff_base: Duration,
}

impl Default for WeightSettings {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
            read_timeout: Duration::from_millis(500),
            max_transfer: Duration::from_secs(120),
            max_read_retries: 5,
            backoff_base: Duration::from_millis(20),
        }
    }
}

pub struct WeightVerifiedExecutor<S, P, C = MonotonicClock> {
    scale: S,
    pumps: P,
    clock: C,
    settings: WeightSettings,
    ledger: VialLedger,
}

impl<S: Scale, P: PumpDriver> WeightVerifiedExecutor<S, P, MonotonicClock> {
    pub fn new(scale: S, pumps: P, vial_volume_ml: f64, settings: WeightSettings) -> Self {
        Self::with_clock(scale, pumps, MonotonicClock::new(), vial_volume_ml, settings)
    }
}

impl<S: Scale, P: PumpDriver, C: Clock> WeightVerifiedExecutor<S, P, C> {
    pub fn with_clock(
        scale: S,
        pumps: P,
        clock: C,
        vial_volume_ml: f64,
        settings: WeightSettings,
    ) -> Self {
        Self {
            scale,
            pumps,
            clock,
            settings,
            ledger: VialLedger::new(vial_volume_ml),
        }
    }

    pub fn ledger(&self) -> &VialLedger {
        &self.ledger
    }

    fn read(&mut self, stop: &StopFlag) -> Result<f64> {
        let timeout = self.settings.read_timeout;
        let scale = &mut self.scale;
        retry_with_backoff(
            &self.clock,
            stop,
            self.settings.max_read_retries,
            self.settings.backoff_base,
            self.settings.read_timeout,
            || scale.read_grams(timeout),
        )
    }

    /// Run `pump` until `ml` grams have moved, or until stop/deadline.
    ///
    /// Returns the grams actually moved. A stop request yields the partial
    /// amount (zero if it lands before the pump starts); hitting the
    /// deadline is an error.
    fn transfer(&mut self, pump: Pump, ml: f64, stop: &StopFlag) -> Result<f64> {
        let initial = match self.read(stop) {
            Ok(w) => w,
            Err(HwError::Cancelled) => {
                tracing::info!(pump = %pump, "stop requested before transfer started");
                return Ok(0.0);
            }
            Err(e) => return Err(e),
        };
        let target = match pump {
            Pump::Waste => initial - ml,
            Pump::Media | Pump::AltMedia => initial + ml,
        };
        let reached = |w: f64| match pump {
            Pump::Waste => w <= target,
            Pump::Media | Pump::AltMedia => w >= target,
        };

        self.pumps
            .start(pump)
            .map_err(|e| HwError::Pump(pump, e.to_string()))?;
        let epoch = self.clock.now();
        let outcome = self.poll_until(pump, stop, epoch, initial, reached);
        // Always stop the pump, even if polling failed.
        let stopped = self
            .pumps
            .stop(pump)
            .map_err(|e| HwError::Pump(pump, e.to_string()));
        let last = outcome?;
        stopped?;

        let moved = (last - initial).abs();
        tracing::debug!(pump = %pump, requested_ml = ml, moved_ml = moved, "transfer finished");
        Ok(moved)
    }

    fn poll_until(
        &mut self,
        pump: Pump,
        stop: &StopFlag,
        epoch: std::time::Instant,
        initial: f64,
        reached: impl Fn(f64) -> bool,
    ) -> Result<f64> {
        let limit_ms = u64::try_from(self.settings.max_transfer.as_millis()).unwrap_or(u64::MAX);
        let mut last = initial;
        loop {
            if stop.is_stop_requested() {
                tracing::info!(pump = %pump, "stop requested mid-transfer");
                return Ok(last);
            }
            if self.clock.ms_since(epoch) >= limit_ms {
                return Err(HwError::TransferTimeout {
                    pump,
                    ms: limit_ms,
                });
            }
            match self.read(stop) {
                Ok(w) => last = w,
                Err(HwError::Cancelled) => return Ok(last),
                Err(e) => return Err(e),
            }
            if reached(last) {
                return Ok(last);
            }
            self.clock.sleep(self.settings.poll);
        }
    }
}

impl<S: Scale, P: PumpDriver, C: Clock> ActuationExecutor for WeightVerifiedExecutor<S, P, C> {
    fn execute(
        &mut self,
        request: &DoseVolumes,
        stop: &StopFlag,
    ) -> std::result::Result<DoseVolumes, BoxError> {
        if let Some(pump) = Pump::ALL.into_iter().find(|p| {
            let ml = request.get(*p);
            !ml.is_finite() || ml < 0.0
        }) {
            return Err(Box::new(HwError::InvalidRequest(format!(
                "{} = {}",
                pump.volume_key(),
                request.get(pump)
            ))));
        }
        let mut moved = DoseVolumes::default();
        for pump in [Pump::Media, Pump::AltMedia, Pump::Waste] {
            let ml = request.get(pump);
            if ml == 0.0 || stop.is_stop_requested() {
                continue;
            }
            let got = match self.transfer(pump, ml, stop) {
                Ok(got) => got,
                // Keep what earlier pumps already moved.
                Err(HwError::Cancelled) => break,
                Err(e) => return Err(Box::new(e)),
            };
            self.ledger.record(pump, got);
            moved.set(pump, got);
        }
        Ok(moved)
    }

    fn alt_media_fraction(&self) -> f64 {
        self.ledger.alt_media_fraction()
    }

    fn vial_volume_ml(&self) -> f64 {
        self.ledger.volume_ml()
    }
}
