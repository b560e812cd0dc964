//! Exchange-volume math for two-liquid mixtures and a switching driver.
//!
//! With a constant working volume `V` holding secondary fraction `c`, adding
//! `v` of pure secondary (and removing `v` of mix) gives `(c*V + v) / (V + v)`.
//! Solving for a target fraction `t` yields `v = V * (t - c) / (1 - t)`.

use reactor_traits::{ActuationExecutor, DoseVolumes, StopFlag};

use crate::error::{BuildError, ReactorError, Result, invalid_input, invalid_value};
use crate::hw_error::to_report;

/// Volume of secondary liquid to exchange so the vial moves from `current`
/// toward `target` fraction. Zero when already at or above target.
pub fn compute_exchange_volume(target: f64, current: f64, vial_volume_ml: f64) -> Result<f64> {
    if !target.is_finite() || !(0.0..1.0).contains(&target) {
        return Err(invalid_input(format!(
            "target fraction must be in [0, 1), got {target}"
        )));
    }
    if !current.is_finite() {
        return Err(invalid_input(format!(
            "current fraction must be finite, got {current}"
        )));
    }
    if !vial_volume_ml.is_finite() || vial_volume_ml < 0.0 {
        return Err(invalid_input(format!(
            "vial volume must be >= 0, got {vial_volume_ml}"
        )));
    }
    Ok((vial_volume_ml * (target - current) / (1.0 - target)).max(0.0))
}

/// Which liquid the vial is currently being driven toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Liquid {
    #[default]
    Primary,
    Secondary,
}

impl Liquid {
    pub fn other(self) -> Self {
        match self {
            Liquid::Primary => Liquid::Secondary,
            Liquid::Secondary => Liquid::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchingConfig {
    /// Volume exchanged per iteration.
    pub exchange_ml: f64,
    /// Secondary fraction above which the switch to secondary is complete.
    pub upper_band: f64,
    /// Secondary fraction below which the switch back to primary is complete.
    pub lower_band: f64,
    pub max_exchanges: u32,
}

impl Default for SwitchingConfig {
    fn default() -> Self {
        Self {
            exchange_ml: 0.75,
            upper_band: 0.95,
            lower_band: 0.05,
            max_exchanges: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchOutcome {
    /// Liquid the vial is now on.
    pub liquid: Liquid,
    /// False when the run was stopped before convergence.
    pub completed: bool,
    pub exchanges: u32,
    /// Totals actually moved by the executor.
    pub moved: DoseVolumes,
    /// Secondary fraction reported after the last exchange.
    pub fraction: f64,
}

/// Drives the vial from one liquid to the other by repeated fixed exchanges.
#[derive(Debug, Clone)]
pub struct SwitchingDoser {
    liquid: Liquid,
    cfg: SwitchingConfig,
}

impl SwitchingDoser {
    pub fn new(cfg: SwitchingConfig) -> Result<Self> {
        if !cfg.exchange_ml.is_finite() || cfg.exchange_ml <= 0.0 {
            return Err(invalid_value("exchange_ml", cfg.exchange_ml));
        }
        if !(0.0 < cfg.lower_band && cfg.lower_band < cfg.upper_band && cfg.upper_band < 1.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "switching bands must satisfy 0 < lower < upper < 1",
            )));
        }
        if cfg.max_exchanges == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_exchanges must be >= 1",
            )));
        }
        Ok(Self {
            liquid: Liquid::Primary,
            cfg,
        })
    }

    pub fn liquid(&self) -> Liquid {
        self.liquid
    }

    pub fn config(&self) -> SwitchingConfig {
        self.cfg
    }

    fn converged(&self, target: Liquid, fraction: f64) -> bool {
        match target {
            Liquid::Secondary => fraction > self.cfg.upper_band,
            Liquid::Primary => fraction < self.cfg.lower_band,
        }
    }

    /// Exchange toward the other liquid until its band is crossed, then flip.
    ///
    /// The fraction is re-read from the executor after every exchange. A stop
    /// request returns what was moved so far without flipping; running out of
    /// exchanges is `NotConverged`.
    pub fn switch(
        &mut self,
        executor: &mut dyn ActuationExecutor,
        stop: &StopFlag,
    ) -> Result<SwitchOutcome> {
        let target = self.liquid.other();
        let request = match target {
            Liquid::Secondary => DoseVolumes::exchange_alt_media(self.cfg.exchange_ml),
            Liquid::Primary => DoseVolumes::exchange_media(self.cfg.exchange_ml),
        };
        let mut moved = DoseVolumes::default();
        let mut exchanges = 0_u32;
        let mut fraction = executor.alt_media_fraction();

        while !self.converged(target, fraction) {
            if stop.is_stop_requested() {
                tracing::info!(exchanges, fraction, "switch interrupted by stop request");
                return Ok(SwitchOutcome {
                    liquid: self.liquid,
                    completed: false,
                    exchanges,
                    moved,
                    fraction,
                });
            }
            if exchanges >= self.cfg.max_exchanges {
                tracing::warn!(exchanges, fraction, "switch did not converge");
                return Err(eyre::Report::new(ReactorError::NotConverged { exchanges }));
            }
            let got = executor.execute(&request, stop).map_err(to_report)?;
            moved.media_ml += got.media_ml;
            moved.alt_media_ml += got.alt_media_ml;
            moved.waste_ml += got.waste_ml;
            exchanges += 1;
            fraction = executor.alt_media_fraction();
            tracing::debug!(exchanges, fraction, "exchange done");
        }

        self.liquid = target;
        Ok(SwitchOutcome {
            liquid: target,
            completed: true,
            exchanges,
            moved,
            fraction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.5, 0.3, 14.0, 5.6)]
    #[case(0.3, 0.5, 14.0, 0.0)]
    #[case(0.0, 0.0, 14.0, 0.0)]
    #[case(0.5, 0.3, 0.0, 0.0)]
    fn exchange_volume(
        #[case] target: f64,
        #[case] current: f64,
        #[case] vial: f64,
        #[case] expected: f64,
    ) {
        let v = compute_exchange_volume(target, current, vial).unwrap();
        assert!((v - expected).abs() < 1e-9, "{v} != {expected}");
    }

    #[rstest]
    #[case(1.0, 0.0, 14.0)]
    #[case(-0.1, 0.0, 14.0)]
    #[case(0.5, f64::NAN, 14.0)]
    #[case(0.5, 0.0, -1.0)]
    fn exchange_volume_rejects_out_of_domain(
        #[case] target: f64,
        #[case] current: f64,
        #[case] vial: f64,
    ) {
        let err = compute_exchange_volume(target, current, vial).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReactorError>(),
            Some(ReactorError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_inverted_bands() {
        let cfg = SwitchingConfig {
            lower_band: 0.9,
            upper_band: 0.1,
            ..SwitchingConfig::default()
        };
        assert!(SwitchingDoser::new(cfg).is_err());
    }
}
