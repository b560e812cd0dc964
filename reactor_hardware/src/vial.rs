//! Volume bookkeeping for a constant-volume vial.
//!
//! Additions are assumed to be balanced by waste removal, so the working
//! volume stays constant and only the alt-media fraction moves.
use reactor_traits::{DoseVolumes, Pump};

#[derive(Debug, Clone, PartialEq)]
pub struct VialLedger {
    volume_ml: f64,
    alt_media_fraction: f64,
    totals: DoseVolumes,
}

impl VialLedger {
    pub fn new(volume_ml: f64) -> Self {
        Self::with_fraction(volume_ml, 0.0)
    }

    pub fn with_fraction(volume_ml: f64, alt_media_fraction: f64) -> Self {
        Self {
            volume_ml,
            alt_media_fraction: alt_media_fraction.clamp(0.0, 1.0),
            totals: DoseVolumes::default(),
        }
    }

    pub fn volume_ml(&self) -> f64 {
        self.volume_ml
    }

    pub fn alt_media_fraction(&self) -> f64 {
        self.alt_media_fraction
    }

    /// Cumulative volume moved per pump.
    pub fn totals(&self) -> DoseVolumes {
        self.totals
    }

    /// Record `ml` moved by `pump`.
    pub fn record(&mut self, pump: Pump, ml: f64) {
        if ml <= 0.0 {
            return;
        }
        let v = self.volume_ml;
        match pump {
            Pump::Media => {
                self.alt_media_fraction = self.alt_media_fraction * v / (v + ml);
            }
            Pump::AltMedia => {
                self.alt_media_fraction = (self.alt_media_fraction * v + ml) / (v + ml);
            }
            Pump::Waste => {}
        }
        self.totals.set(pump, self.totals.get(pump) + ml);
    }

    pub fn record_all(&mut self, moved: &DoseVolumes) {
        for pump in [Pump::Media, Pump::AltMedia, Pump::Waste] {
            self.record(pump, moved.get(pump));
        }
    }
}
