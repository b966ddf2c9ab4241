//! Direct interpolation of the five quotes.
//!
//! The quoted vols are interpolated against log-moneyness `x = ln(K / K_ATM)`
//! of their pillar strikes. No model sits behind the curve, so nothing stops
//! a badly shaped quote set from producing a negative density; use
//! [`SmileSection::is_arbitrage_free`] to check.

use serde::{Deserialize, Serialize};

use crate::conventions;
use crate::delta::StrikePillars;
use crate::error::{self, FxSmileError};
use crate::market::VolatilitySmile;
use crate::math::{Interpolation, Interpolator};
use crate::smile::SmileSection;
use crate::smile::arbitrage::{ArbitrageReport, scan_density};
use crate::types::Vol;
use crate::validate::validate_positive;

/// Smile interpolated through the quotes in log-moneyness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "InterpolatedSmileRaw", into = "InterpolatedSmileRaw")]
pub struct InterpolatedSmile {
    forward: f64,
    expiry: f64,
    pillars: StrikePillars,
    quotes: VolatilitySmile,
    curve: Interpolator,
}

#[derive(Serialize, Deserialize)]
struct InterpolatedSmileRaw {
    forward: f64,
    expiry: f64,
    pillars: StrikePillars,
    quotes: VolatilitySmile,
    scheme: Interpolation,
}

impl TryFrom<InterpolatedSmileRaw> for InterpolatedSmile {
    type Error = FxSmileError;
    fn try_from(raw: InterpolatedSmileRaw) -> Result<Self, Self::Error> {
        Self::new(raw.forward, raw.expiry, raw.pillars, raw.quotes, raw.scheme)
    }
}

impl From<InterpolatedSmile> for InterpolatedSmileRaw {
    fn from(s: InterpolatedSmile) -> Self {
        Self {
            forward: s.forward,
            expiry: s.expiry,
            pillars: s.pillars,
            quotes: s.quotes,
            scheme: s.curve.scheme(),
        }
    }
}

impl InterpolatedSmile {
    /// Build the curve through `(ln(Kᵢ/K_ATM), σᵢ)`.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a non-positive forward or
    /// expiry.
    pub fn new(
        forward: f64,
        expiry: f64,
        pillars: StrikePillars,
        quotes: VolatilitySmile,
        scheme: Interpolation,
    ) -> error::Result<Self> {
        validate_positive(forward, "forward")?;
        validate_positive(expiry, "expiry")?;
        let curve = Interpolator::new(scheme, pillars.log_moneyness().to_vec(), quotes.vols().to_vec())?;
        Ok(Self {
            forward,
            expiry,
            pillars,
            quotes,
            curve,
        })
    }

    pub fn pillars(&self) -> &StrikePillars {
        &self.pillars
    }

    pub fn quotes(&self) -> &VolatilitySmile {
        &self.quotes
    }

    pub fn scheme(&self) -> Interpolation {
        self.curve.scheme()
    }
}

impl SmileSection for InterpolatedSmile {
    fn vol(&self, strike: f64) -> error::Result<Vol> {
        validate_positive(strike, "strike")?;
        let v = self.curve.value(conventions::log_moneyness(strike, self.pillars.atm()));
        if !v.is_finite() || v <= 0.0 {
            return Err(FxSmileError::NumericalError {
                message: format!("interpolated vol {v} at strike {strike}"),
            });
        }
        Ok(Vol(v))
    }

    fn forward(&self) -> f64 {
        self.forward
    }

    fn expiry(&self) -> f64 {
        self.expiry
    }

    /// Finite-difference density on 200 strikes between the 10-delta strikes.
    fn is_arbitrage_free(&self) -> error::Result<ArbitrageReport> {
        Ok(scan_density(self, self.pillars.k10p(), self.pillars.k10c(), 200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::DeltaPillar;
    use approx::assert_abs_diff_eq;

    const F: f64 = 1.10;

    fn pillars() -> StrikePillars {
        StrikePillars::new([0.95, 1.02, 1.10, 1.18, 1.26]).unwrap()
    }

    fn smile(vols: [f64; 5], scheme: Interpolation) -> InterpolatedSmile {
        InterpolatedSmile::new(F, 1.0, pillars(), VolatilitySmile::new(vols).unwrap(), scheme).unwrap()
    }

    #[test]
    fn reproduces_quotes_at_pillars() {
        let s = smile([0.12, 0.105, 0.10, 0.102, 0.11], Interpolation::default());
        for pillar in DeltaPillar::ALL {
            assert_abs_diff_eq!(
                s.vol(s.pillars().strike(pillar)).unwrap().0,
                s.quotes().vol(pillar),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn linear_midpoint_in_log_moneyness() {
        let s = smile(
            [0.12, 0.105, 0.10, 0.102, 0.11],
            Interpolation::PiecewiseLinear {
                flat_extrapolation: true,
            },
        );
        let k = (1.10f64 * 1.18).sqrt();
        assert_abs_diff_eq!(s.vol(k).unwrap().0, 0.101, epsilon = 1e-12);
        // flat beyond the last pillar
        assert_abs_diff_eq!(s.vol(2.0).unwrap().0, 0.11, epsilon = 1e-12);
    }

    #[test]
    fn flat_quotes_give_lognormal_density() {
        let sigma = 0.1;
        let s = smile([sigma; 5], Interpolation::default());
        for k in [1.0, F, 1.2] {
            let d2 = ((F / k).ln() - 0.5 * sigma * sigma) / sigma;
            let expected = (-0.5 * d2 * d2).exp() / (2.0 * std::f64::consts::PI).sqrt() / (k * sigma);
            assert_abs_diff_eq!(s.density(k).unwrap(), expected, epsilon = 1e-5);
        }
        assert!(s.is_arbitrage_free().unwrap().is_free);
    }

    #[test]
    fn mild_smile_is_arbitrage_free() {
        let s = smile([0.12, 0.105, 0.10, 0.102, 0.11], Interpolation::default());
        assert!(s.is_arbitrage_free().unwrap().is_free);
    }

    #[test]
    fn atm_spike_is_flagged() {
        let s = smile([0.10, 0.10, 0.30, 0.10, 0.10], Interpolation::default());
        let report = s.is_arbitrage_free().unwrap();
        assert!(!report.is_free);
        assert!(report.worst_violation().is_some());
    }

    #[test]
    fn rejects_bad_inputs() {
        let s = smile([0.1; 5], Interpolation::default());
        assert!(s.vol(0.0).is_err());
        let quotes = VolatilitySmile::new([0.1; 5]).unwrap();
        assert!(InterpolatedSmile::new(-1.0, 1.0, pillars(), quotes, Interpolation::default()).is_err());
    }

    #[test]
    fn serde_round_trip_rebuilds_curve() {
        let s = smile(
            [0.12, 0.105, 0.10, 0.102, 0.11],
            Interpolation::PiecewiseLinear {
                flat_extrapolation: false,
            },
        );
        let json = serde_json::to_string(&s).unwrap();
        let back: InterpolatedSmile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scheme(), s.scheme());
        assert_eq!(back.vol(1.05).unwrap(), s.vol(1.05).unwrap());
    }
}
