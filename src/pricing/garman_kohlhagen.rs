//! Garman–Kohlhagen pricing of FX vanillas.
//!
//! ```text
//! d₁ = (ln(S/K) + (r_d − r_f + σ²/2)·T) / (σ√T),   d₂ = d₁ − σ√T
//! V  = ω·(S·e^{−r_f T}·Φ(ω·d₁) − K·e^{−r_d T}·Φ(ω·d₂))
//! ```
//!
//! with ω = +1 for calls and −1 for puts. All functions take strike, vol and
//! option type explicitly; the pricer holds only the immutable market snapshot.
//!
//! # References
//! - Garman, M. & Kohlhagen, S. "Foreign Currency Option Values" (1983)

use serde::{Deserialize, Serialize};

use crate::error::{self, FxSmileError};
use crate::market::MarketSnapshot;
use crate::math::normal::{cdf, pdf};
use crate::math::solver::{BisectionConfig, bisection};
use crate::pricing::Greeks;
use crate::types::{OptionType, Vol};
use crate::validate::{validate_interval, validate_positive};

/// Search settings for implied-volatility inversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpliedVolConfig {
    /// Lowest vol in the bisection bracket.
    pub lower: f64,
    /// Highest vol in the bisection bracket.
    pub upper: f64,
    /// Bracket half-width at which the search stops.
    pub tolerance: f64,
    /// Maximum number of halvings.
    pub max_iter: usize,
}

impl Default for ImpliedVolConfig {
    fn default() -> Self {
        Self {
            lower: 0.001,
            upper: 0.90,
            tolerance: 1e-12,
            max_iter: 50,
        }
    }
}

/// Garman–Kohlhagen pricer bound to one market snapshot.
///
/// ```
/// use fxsmile::market::MarketSnapshot;
/// use fxsmile::pricing::GarmanKohlhagen;
/// use fxsmile::OptionType;
///
/// let gk = GarmanKohlhagen::new(MarketSnapshot::new(45.451, 0.054, 0.10, 0.876)?);
/// let put = gk.price(46.0, 0.18, OptionType::Put)?;
/// assert!((put - 4.125043).abs() < 1e-6);
/// # Ok::<(), fxsmile::FxSmileError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarmanKohlhagen {
    market: MarketSnapshot,
}

impl GarmanKohlhagen {
    pub fn new(market: MarketSnapshot) -> Self {
        Self { market }
    }

    /// Undiscounted Black pricer on the forward: spot = `forward`, both rates zero.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a non-positive forward or expiry.
    pub fn forward_measure(forward: f64, expiry: f64) -> error::Result<Self> {
        Ok(Self::new(MarketSnapshot::new(forward, 0.0, 0.0, expiry)?))
    }

    pub fn market(&self) -> &MarketSnapshot {
        &self.market
    }

    /// d₁, or 0 when strike or vol is non-positive.
    pub fn d1(&self, strike: f64, vol: f64) -> f64 {
        let m = &self.market;
        if strike <= 0.0 || vol <= 0.0 {
            return 0.0;
        }
        let sd = vol * m.term().sqrt();
        ((m.spot() / strike).ln() + (m.domestic_rate() - m.foreign_rate() + 0.5 * vol * vol) * m.term())
            / sd
    }

    /// d₂ = d₁ − σ√T.
    pub fn d2(&self, strike: f64, vol: f64) -> f64 {
        self.d1(strike, vol) - vol * self.market.term().sqrt()
    }

    /// Present value in domestic currency per unit of foreign notional.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a non-positive strike or vol.
    pub fn price(&self, strike: f64, vol: f64, option_type: OptionType) -> error::Result<f64> {
        validate_positive(strike, "strike")?;
        validate_positive(vol, "vol")?;
        Ok(self.price_unchecked(strike, vol, option_type))
    }

    pub(crate) fn price_unchecked(&self, strike: f64, vol: f64, option_type: OptionType) -> f64 {
        let m = &self.market;
        let w = option_type.sign();
        let d1 = self.d1(strike, vol);
        let d2 = d1 - vol * m.term().sqrt();
        w * (m.foreign_discount() * m.spot() * cdf(w * d1) - m.domestic_discount() * strike * cdf(w * d2))
    }

    /// Spot delta `ω·e^{−r_f T}·Φ(ω·d₁)`.
    ///
    /// # Errors
    /// See [`greeks`](Self::greeks).
    pub fn delta(&self, strike: f64, vol: f64, option_type: OptionType) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let w = option_type.sign();
        Ok(w * self.market.foreign_discount() * cdf(w * self.d1(strike, vol)))
    }

    /// Spot gamma `e^{−r_f T}·φ(d₁) / (σ·S·√T)`.
    pub fn gamma(&self, strike: f64, vol: f64) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let m = &self.market;
        Ok(m.foreign_discount() * pdf(self.d1(strike, vol)) / (vol * m.spot() * m.term().sqrt()))
    }

    /// Vega `S·e^{−r_f T}·√T·φ(d₁)`, per unit of vol.
    pub fn vega(&self, strike: f64, vol: f64) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let m = &self.market;
        Ok(m.spot() * m.foreign_discount() * m.term().sqrt() * pdf(self.d1(strike, vol)))
    }

    /// Theta per year: time decay plus the carry of both deposit legs.
    pub fn theta(&self, strike: f64, vol: f64, option_type: OptionType) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let m = &self.market;
        let w = option_type.sign();
        let d1 = self.d1(strike, vol);
        let d2 = d1 - vol * m.term().sqrt();
        let fwd_leg = m.spot() * m.foreign_discount();
        Ok(-fwd_leg * pdf(d1) * vol / (2.0 * m.term().sqrt())
            + w * m.foreign_rate() * fwd_leg * cdf(w * d1)
            - w * m.domestic_rate() * strike * m.domestic_discount() * cdf(w * d2))
    }

    /// Vanna `−e^{−r_f T}·(d₂/σ)·φ(d₁)`.
    pub fn vanna(&self, strike: f64, vol: f64) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let d1 = self.d1(strike, vol);
        let d2 = d1 - vol * self.market.term().sqrt();
        Ok(-self.market.foreign_discount() * d2 / vol * pdf(d1))
    }

    /// Volga `(S/σ)·e^{−r_f T}·√T·d₁·d₂·φ(d₁)`.
    pub fn volga(&self, strike: f64, vol: f64) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let m = &self.market;
        let d1 = self.d1(strike, vol);
        let d2 = d1 - vol * m.term().sqrt();
        Ok(m.spot() / vol * m.foreign_discount() * m.term().sqrt() * d1 * d2 * pdf(d1))
    }

    /// Dual delta `−ω·e^{−r_d T}·Φ(ω·d₂)`.
    pub fn dual_delta(&self, strike: f64, vol: f64, option_type: OptionType) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let w = option_type.sign();
        Ok(-w * self.market.domestic_discount() * cdf(w * self.d2(strike, vol)))
    }

    /// Dual gamma `e^{−r_d T}·φ(d₂) / (K·σ·√T)`.
    pub fn dual_gamma(&self, strike: f64, vol: f64) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let m = &self.market;
        Ok(m.domestic_discount() * pdf(self.d2(strike, vol)) / (strike * vol * m.term().sqrt()))
    }

    /// Dual vega `(S/K)·e^{−r_f T}·(d₁/σ)·φ(d₁)`, the strike derivative of vega.
    pub fn dual_vega(&self, strike: f64, vol: f64) -> error::Result<f64> {
        self.check_greek_inputs(strike, vol)?;
        let m = &self.market;
        let d1 = self.d1(strike, vol);
        Ok(m.spot() / strike * m.foreign_discount() * d1 / vol * pdf(d1))
    }

    /// All sensitivities at once.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a non-positive strike and
    /// [`FxSmileError::DomainError`] for a non-positive vol.
    pub fn greeks(&self, strike: f64, vol: f64, option_type: OptionType) -> error::Result<Greeks> {
        Ok(Greeks {
            delta: self.delta(strike, vol, option_type)?,
            gamma: self.gamma(strike, vol)?,
            vega: self.vega(strike, vol)?,
            theta: self.theta(strike, vol, option_type)?,
            vanna: self.vanna(strike, vol)?,
            volga: self.volga(strike, vol)?,
            dual_delta: self.dual_delta(strike, vol, option_type)?,
            dual_gamma: self.dual_gamma(strike, vol)?,
            dual_vega: self.dual_vega(strike, vol)?,
        })
    }

    /// Implied volatility for a target premium using the default bracket
    /// \[0.001, 0.90\].
    ///
    /// # Errors
    /// Returns [`FxSmileError::NoRootInInterval`] if the target cannot be
    /// reached inside the bracket.
    pub fn implied_volatility(
        &self,
        strike: f64,
        target_price: f64,
        option_type: OptionType,
    ) -> error::Result<Vol> {
        self.implied_volatility_with(strike, target_price, option_type, &ImpliedVolConfig::default())
    }

    /// Implied volatility with an explicit search configuration.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a non-positive strike or
    /// target, or an empty bracket; otherwise as
    /// [`implied_volatility`](Self::implied_volatility).
    pub fn implied_volatility_with(
        &self,
        strike: f64,
        target_price: f64,
        option_type: OptionType,
        config: &ImpliedVolConfig,
    ) -> error::Result<Vol> {
        validate_positive(strike, "strike")?;
        validate_positive(target_price, "target price")?;
        validate_interval(config.lower, config.upper, "implied vol bracket")?;
        if config.lower <= 0.0 {
            return Err(FxSmileError::InvalidInput {
                message: format!("implied vol bracket must be positive, got lower={}", config.lower),
            });
        }
        let vol = bisection(
            |v| self.price_unchecked(strike, v, option_type) - target_price,
            config.lower,
            config.upper,
            BisectionConfig::new(config.tolerance, config.max_iter),
        )?;
        Ok(Vol(vol))
    }

    fn check_greek_inputs(&self, strike: f64, vol: f64) -> error::Result<()> {
        validate_positive(strike, "strike")?;
        if !vol.is_finite() || vol <= 0.0 {
            return Err(FxSmileError::DomainError {
                message: format!("Greeks require a positive vol, got {vol}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const S: f64 = 45.451;
    const K: f64 = 46.0;
    const T: f64 = 0.876;
    const RD: f64 = 0.054;
    const RF: f64 = 0.10;
    const VOL: f64 = 0.18;

    fn pricer() -> GarmanKohlhagen {
        GarmanKohlhagen::new(MarketSnapshot::new(S, RD, RF, T).unwrap())
    }

    #[test]
    fn put_price_reference() {
        let p = pricer().price(K, VOL, OptionType::Put).unwrap();
        assert_abs_diff_eq!(p, 4.125043224511003, epsilon = 1e-9);
    }

    #[test]
    fn greeks_reference() {
        let gk = pricer();
        assert_abs_diff_eq!(gk.delta(K, VOL, OptionType::Call).unwrap(), 0.376084301042287, epsilon = 1e-9);
        assert_abs_diff_eq!(gk.gamma(K, VOL).unwrap(), 0.0465248841826033, epsilon = 1e-9);
        assert_abs_diff_eq!(gk.vega(K, VOL).unwrap(), 15.1547507432278, epsilon = 1e-8);
        assert_abs_diff_eq!(gk.vanna(K, VOL).unwrap(), 0.781155007052361, epsilon = 1e-9);
        assert_abs_diff_eq!(gk.volga(K, VOL).unwrap(), 7.51731525857879, epsilon = 1e-8);
        assert_abs_diff_eq!(gk.theta(K, VOL, OptionType::Put).unwrap(), -2.4633352496942362, epsilon = 1e-9);
    }

    #[test]
    fn dual_greeks_reference() {
        let gk = pricer();
        assert_abs_diff_eq!(
            gk.dual_delta(K, VOL, OptionType::Call).unwrap(),
            -0.330524888341401,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(gk.dual_gamma(K, VOL).unwrap(), 0.0454209823850242, epsilon = 1e-9);
    }

    #[test]
    fn dual_greeks_match_finite_differences() {
        let gk = pricer();
        let h = 1e-4;
        for ot in [OptionType::Call, OptionType::Put] {
            let up = gk.price(K + h, VOL, ot).unwrap();
            let mid = gk.price(K, VOL, ot).unwrap();
            let dn = gk.price(K - h, VOL, ot).unwrap();
            assert_abs_diff_eq!(gk.dual_delta(K, VOL, ot).unwrap(), (up - dn) / (2.0 * h), epsilon = 1e-7);
            assert_abs_diff_eq!(
                gk.dual_gamma(K, VOL).unwrap(),
                (up - 2.0 * mid + dn) / (h * h),
                epsilon = 1e-5
            );
        }
        let vega_up = gk.vega(K + h, VOL).unwrap();
        let vega_dn = gk.vega(K - h, VOL).unwrap();
        assert_abs_diff_eq!(gk.dual_vega(K, VOL).unwrap(), (vega_up - vega_dn) / (2.0 * h), epsilon = 1e-6);
    }

    #[test]
    fn greeks_struct_matches_individual_calls() {
        let gk = pricer();
        let g = gk.greeks(K, VOL, OptionType::Put).unwrap();
        assert_eq!(g.delta, gk.delta(K, VOL, OptionType::Put).unwrap());
        assert_eq!(g.theta, gk.theta(K, VOL, OptionType::Put).unwrap());
        assert_eq!(g.dual_vega, gk.dual_vega(K, VOL).unwrap());
    }

    #[test]
    fn put_call_parity() {
        let gk = pricer();
        let m = gk.market();
        for &k in &[30.0, 42.0, 46.0, 55.0, 70.0] {
            let c = gk.price(k, VOL, OptionType::Call).unwrap();
            let p = gk.price(k, VOL, OptionType::Put).unwrap();
            let fwd = m.spot() * m.foreign_discount() - k * m.domestic_discount();
            assert_abs_diff_eq!(c - p, fwd, epsilon = 1e-10);
        }
    }

    #[test]
    fn implied_vol_reference() {
        let iv = pricer().implied_volatility(K, 4.206984, OptionType::Put).unwrap();
        assert_abs_diff_eq!(iv.0, 0.1854, epsilon = 1e-4);
    }

    #[test]
    fn implied_vol_round_trip() {
        let gk = pricer();
        for &v in &[0.05, 0.18, 0.42, 0.85] {
            let p = gk.price(50.0, v, OptionType::Call).unwrap();
            let iv = gk.implied_volatility(50.0, p, OptionType::Call).unwrap();
            assert_abs_diff_eq!(iv.0, v, epsilon = 1e-9);
        }
    }

    #[test]
    fn implied_vol_unreachable_target() {
        // Above the premium at the top of the bracket.
        let r = pricer().implied_volatility(K, 30.0, OptionType::Put);
        assert!(matches!(r, Err(FxSmileError::NoRootInInterval { .. })));
    }

    #[test]
    fn implied_vol_custom_bracket() {
        let gk = pricer();
        let p = gk.price(K, 1.5, OptionType::Call).unwrap();
        assert!(gk.implied_volatility(K, p, OptionType::Call).is_err());
        let config = ImpliedVolConfig {
            upper: 3.0,
            ..ImpliedVolConfig::default()
        };
        let iv = gk.implied_volatility_with(K, p, OptionType::Call, &config).unwrap();
        assert_abs_diff_eq!(iv.0, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn d1_guard_for_degenerate_inputs() {
        let gk = pricer();
        assert_eq!(gk.d1(0.0, VOL), 0.0);
        assert_eq!(gk.d1(K, 0.0), 0.0);
        assert_eq!(gk.d1(K, -0.1), 0.0);
    }

    #[test]
    fn greeks_reject_non_positive_vol() {
        let gk = pricer();
        assert!(matches!(gk.gamma(K, 0.0), Err(FxSmileError::DomainError { .. })));
        assert!(matches!(
            gk.greeks(K, -0.2, OptionType::Call),
            Err(FxSmileError::DomainError { .. })
        ));
        assert!(matches!(gk.vega(-1.0, VOL), Err(FxSmileError::InvalidInput { .. })));
        assert!(matches!(
            gk.price(K, 0.0, OptionType::Call),
            Err(FxSmileError::InvalidInput { .. })
        ));
    }
}
