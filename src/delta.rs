//! Delta-to-strike conversion for the five quoted smile pillars.
//!
//! FX smiles are quoted by premium-unadjusted spot delta. Inverting
//! `Δ = ω·e^{−r_f T}·Φ(ω·d₁)` for the strike gives
//!
//! ```text
//! K = F · exp(−ω·Φ⁻¹(e^{r_f T}·|Δ|)·σ√T + σ²T/2)
//! ```
//!
//! and the ATM pillar is the delta-neutral straddle strike `F·e^{σ²T/2}`.

use serde::{Deserialize, Serialize};

use crate::error::{self, FxSmileError};
use crate::market::{DeltaPillar, MarketSnapshot, VolatilitySmile};
use crate::math::normal::inverse_cdf;
use crate::types::{OptionType, Strike};
use crate::validate::validate_positive;

/// Absolute deltas are clamped to this value when they reach 1.
const MAX_ABS_DELTA: f64 = 0.999;
/// Vols above 200% are rejected.
const MAX_VOL: f64 = 2.0;

/// Strike solver bound to one market snapshot.
///
/// ```
/// use fxsmile::delta::StrikeFromDelta;
/// use fxsmile::market::MarketSnapshot;
/// use fxsmile::OptionType;
///
/// let sfd = StrikeFromDelta::new(MarketSnapshot::new(100.0, 0.01, 0.02, 1.0)?);
/// let k = sfd.strike_from_delta(0.23, OptionType::Call, 0.12)?;
/// assert!((k.0 - 108.766767822761).abs() < 1e-6);
/// # Ok::<(), fxsmile::FxSmileError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrikeFromDelta {
    market: MarketSnapshot,
}

impl StrikeFromDelta {
    pub fn new(market: MarketSnapshot) -> Self {
        Self { market }
    }

    pub fn forward(&self) -> f64 {
        self.market.forward()
    }

    /// Delta-neutral straddle strike `F·e^{σ²T/2}`.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a non-positive vol.
    pub fn atm_strike(&self, vol: f64) -> error::Result<Strike> {
        validate_positive(vol, "ATM vol")?;
        Ok(Strike(self.forward() * (0.5 * vol * vol * self.market.term()).exp()))
    }

    /// Strike whose spot delta equals `delta` at the given vol.
    ///
    /// Only the magnitude of `delta` is used; the sign comes from
    /// `option_type`. Magnitudes of 1 or more are clamped to 0.999.
    ///
    /// # Errors
    /// Returns [`FxSmileError::DomainError`] if `e^{r_f T}·|Δ| ≥ 1` or the vol
    /// exceeds 200%, and [`FxSmileError::InvalidInput`] for a non-positive vol.
    pub fn strike_from_delta(&self, delta: f64, option_type: OptionType, vol: f64) -> error::Result<Strike> {
        validate_positive(vol, "vol")?;
        if vol > MAX_VOL {
            return Err(FxSmileError::DomainError {
                message: format!("vol {vol} exceeds the {MAX_VOL} limit for delta inversion"),
            });
        }
        if !delta.is_finite() || delta == 0.0 {
            return Err(FxSmileError::DomainError {
                message: format!("delta must be a non-zero finite value, got {delta}"),
            });
        }
        let abs_delta = if delta.abs() >= 1.0 { MAX_ABS_DELTA } else { delta.abs() };

        let t = self.market.term();
        let z = (self.market.foreign_rate() * t).exp() * abs_delta;
        if z >= 1.0 {
            return Err(FxSmileError::DomainError {
                message: format!("delta {abs_delta} is unreachable with foreign discount: e^(r_f T)|delta| = {z} >= 1"),
            });
        }
        let q = inverse_cdf(z)?;
        let w = option_type.sign();
        Ok(Strike(self.forward() * (-w * q * vol * t.sqrt() + 0.5 * vol * vol * t).exp()))
    }

    /// Strikes of the five pillars of `smile`, each at its own quoted vol.
    ///
    /// # Errors
    /// Propagates conversion errors, and returns
    /// [`FxSmileError::InvalidInput`] if the strikes are not strictly
    /// increasing in pillar order.
    pub fn strike_vector(&self, smile: &VolatilitySmile) -> error::Result<StrikePillars> {
        let mut strikes = [0.0; 5];
        for pillar in DeltaPillar::ALL {
            let vol = smile.vol(pillar);
            let strike = match pillar {
                DeltaPillar::Put10 => self.strike_from_delta(0.10, OptionType::Put, vol)?,
                DeltaPillar::Put25 => self.strike_from_delta(0.25, OptionType::Put, vol)?,
                DeltaPillar::Atm => self.atm_strike(vol)?,
                DeltaPillar::Call25 => self.strike_from_delta(0.25, OptionType::Call, vol)?,
                DeltaPillar::Call10 => self.strike_from_delta(0.10, OptionType::Call, vol)?,
            };
            strikes[pillar.index()] = strike.0;
        }
        StrikePillars::new(strikes)
    }
}

/// Absolute strikes of the 10P, 25P, ATM, 25C and 10C pillars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 5]", into = "[f64; 5]")]
pub struct StrikePillars {
    strikes: [f64; 5],
}

impl TryFrom<[f64; 5]> for StrikePillars {
    type Error = FxSmileError;
    fn try_from(strikes: [f64; 5]) -> Result<Self, Self::Error> {
        Self::new(strikes)
    }
}

impl From<StrikePillars> for [f64; 5] {
    fn from(p: StrikePillars) -> Self {
        p.strikes
    }
}

impl StrikePillars {
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] unless the strikes are positive
    /// and strictly increasing.
    pub fn new(strikes: [f64; 5]) -> error::Result<Self> {
        for &k in &strikes {
            validate_positive(k, "pillar strike")?;
        }
        if let Some(i) = strikes.windows(2).position(|w| w[1] <= w[0]) {
            return Err(FxSmileError::InvalidInput {
                message: format!(
                    "pillar strikes must be strictly increasing, got {:?} then {:?} ({} >= {})",
                    DeltaPillar::ALL[i],
                    DeltaPillar::ALL[i + 1],
                    strikes[i],
                    strikes[i + 1]
                ),
            });
        }
        Ok(Self { strikes })
    }

    pub fn strikes(&self) -> &[f64; 5] {
        &self.strikes
    }

    pub fn strike(&self, pillar: DeltaPillar) -> f64 {
        self.strikes[pillar.index()]
    }

    pub fn k10p(&self) -> f64 {
        self.strikes[0]
    }

    pub fn k25p(&self) -> f64 {
        self.strikes[1]
    }

    pub fn atm(&self) -> f64 {
        self.strikes[2]
    }

    pub fn k25c(&self) -> f64 {
        self.strikes[3]
    }

    pub fn k10c(&self) -> f64 {
        self.strikes[4]
    }

    /// `ln(Kᵢ / K_ATM)` for each pillar.
    pub fn log_moneyness(&self) -> [f64; 5] {
        self.strikes.map(|k| (k / self.atm()).ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sfd() -> StrikeFromDelta {
        StrikeFromDelta::new(MarketSnapshot::new(100.0, 0.01, 0.02, 1.0).unwrap())
    }

    #[test]
    fn strike_from_call_delta_reference() {
        let k = sfd().strike_from_delta(0.23, OptionType::Call, 0.12).unwrap();
        assert_abs_diff_eq!(k.0, 108.766767822761, epsilon = 1e-6);
    }

    #[test]
    fn atm_strike_reference() {
        assert_abs_diff_eq!(sfd().atm_strike(0.11).unwrap().0, 99.6057790988489, epsilon = 1e-9);
    }

    #[test]
    fn forward_reference() {
        let s = StrikeFromDelta::new(MarketSnapshot::new(100.0, 0.01, 0.05, 0.7).unwrap());
        assert_abs_diff_eq!(s.forward(), 97.2388366801247, epsilon = 1e-10);
    }

    #[test]
    fn strike_vector_reference() {
        let s = StrikeFromDelta::new(MarketSnapshot::new(10.3719, 0.00565, 0.01822, 0.194520547945205).unwrap());
        let smile = VolatilitySmile::new([0.09852, 0.09542, 0.0973, 0.10582, 0.11732]).unwrap();
        let p = s.strike_vector(&smile).unwrap();
        let expected = [
            9.796265875871027,
            10.067098505250692,
            10.356101824110898,
            10.687697656702378,
            11.069582777590423,
        ];
        for (k, e) in p.strikes().iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*k, *e, epsilon = 1e-6);
        }
        assert_eq!(p.k10p(), p.strike(DeltaPillar::Put10));
        assert_eq!(p.k10c(), p.strike(DeltaPillar::Call10));
    }

    #[test]
    fn strike_round_trips_through_delta() {
        let market = MarketSnapshot::new(1.1, 0.03, 0.015, 0.75).unwrap();
        let s = StrikeFromDelta::new(market);
        let gk = crate::pricing::GarmanKohlhagen::new(market);
        for (delta, ot) in [(0.10, OptionType::Put), (0.25, OptionType::Put), (0.25, OptionType::Call)] {
            let Strike(k) = s.strike_from_delta(delta, ot, 0.14).unwrap();
            let d = gk.delta(k, 0.14, ot).unwrap();
            assert_abs_diff_eq!(d.abs(), delta, epsilon = 1e-8);
        }
    }

    #[test]
    fn log_moneyness_is_zero_at_atm() {
        let p = sfd()
            .strike_vector(&VolatilitySmile::new([0.13, 0.12, 0.11, 0.12, 0.14]).unwrap())
            .unwrap();
        let lm = p.log_moneyness();
        assert_eq!(lm[2], 0.0);
        assert!(lm[0] < lm[1] && lm[1] < 0.0 && lm[3] > 0.0 && lm[4] > lm[3]);
    }

    #[test]
    fn delta_of_one_is_clamped() {
        let s = StrikeFromDelta::new(MarketSnapshot::new(100.0, 0.0, 0.0, 1.0).unwrap());
        let clamped = s.strike_from_delta(1.0, OptionType::Call, 0.1).unwrap();
        let direct = s.strike_from_delta(0.999, OptionType::Call, 0.1).unwrap();
        assert_eq!(clamped, direct);
    }

    #[test]
    fn unreachable_delta_is_domain_error() {
        // e^{r_f T} · 0.999 > 1 for r_f = 5%, T = 1
        let s = StrikeFromDelta::new(MarketSnapshot::new(100.0, 0.0, 0.05, 1.0).unwrap());
        assert!(matches!(
            s.strike_from_delta(0.999, OptionType::Put, 0.1),
            Err(FxSmileError::DomainError { .. })
        ));
    }

    #[test]
    fn vol_above_limit_is_domain_error() {
        assert!(matches!(
            sfd().strike_from_delta(0.25, OptionType::Call, 2.5),
            Err(FxSmileError::DomainError { .. })
        ));
    }

    #[test]
    fn pillars_must_increase() {
        assert!(matches!(
            StrikePillars::new([1.0, 1.1, 1.05, 1.2, 1.3]),
            Err(FxSmileError::InvalidInput { .. })
        ));
    }
}
