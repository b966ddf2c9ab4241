//! Single-tenor FX volatility surface.
//!
//! An [`FxVolSurface`] binds a market snapshot to a five-pillar quote set and
//! owns everything derived from it: the pillar strikes, the calibrated SABR
//! core and, for [`SmileModel::SabrWithWings`], the fitted tails. Queries for
//! an arbitrary strike go to whichever smile the model selects.
//!
//! - [`build_surface`] — one call from raw market numbers to a surface
//! - [`SurfaceBuilder`] — several tenors of one currency pair at once

pub mod builder;

pub use builder::SurfaceBuilder;

use serde::{Deserialize, Serialize};

use crate::delta::{StrikeFromDelta, StrikePillars};
use crate::error;
use crate::market::{MarketSnapshot, VolatilitySmile};
use crate::math::Interpolation;
use crate::pricing::{GarmanKohlhagen, Greeks, ImpliedVolConfig};
use crate::smile::arbitrage::ArbitrageReport;
use crate::smile::calibration::calibrate;
use crate::smile::sabr::DEFAULT_BETA;
use crate::smile::{
    InterpolatedSmile, SabrCalibration, SabrCalibrationConfig, SabrSmile, SmileSection, TailCoefficients, WingSmile,
};
use crate::types::{OptionType, Vol};

/// Which smile a surface fits to its quotes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SmileModel {
    /// Calibrated SABR at every strike.
    Sabr,
    /// SABR between the 25-delta strikes, analytic price tails outside.
    #[default]
    SabrWithWings,
    /// Quotes interpolated in log-moneyness; no calibration.
    Interpolated(Interpolation),
}

/// Model choice and numerical settings shared by every surface build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub model: SmileModel,
    /// SABR CEV exponent, held fixed during calibration.
    pub beta: f64,
    pub calibration: SabrCalibrationConfig,
    pub implied_vol: ImpliedVolConfig,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            model: SmileModel::default(),
            beta: DEFAULT_BETA,
            calibration: SabrCalibrationConfig::default(),
            implied_vol: ImpliedVolConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
enum FittedSmile {
    Sabr(SabrSmile),
    Wing(WingSmile),
    Interpolated(InterpolatedSmile),
}

impl FittedSmile {
    fn section(&self) -> &dyn SmileSection {
        match self {
            FittedSmile::Sabr(s) => s,
            FittedSmile::Wing(s) => s,
            FittedSmile::Interpolated(s) => s,
        }
    }
}

/// Everything derived from one quote set.
#[derive(Debug, Clone)]
struct Fit {
    pillars: StrikePillars,
    calibration: Option<SabrCalibration>,
    smile: FittedSmile,
}

impl Fit {
    fn run(market: &MarketSnapshot, quotes: &VolatilitySmile, config: &SurfaceConfig) -> error::Result<Self> {
        let pillars = StrikeFromDelta::new(*market).strike_vector(quotes)?;
        let (forward, expiry) = (market.forward(), market.term());

        if let SmileModel::Interpolated(scheme) = config.model {
            let smile = InterpolatedSmile::new(forward, expiry, pillars, *quotes, scheme)?;
            return Ok(Self {
                pillars,
                calibration: None,
                smile: FittedSmile::Interpolated(smile),
            });
        }

        let calibration = calibrate(forward, expiry, &pillars, quotes, config.beta, &config.calibration)?;
        let smile = match config.model {
            SmileModel::SabrWithWings => FittedSmile::Wing(WingSmile::fit(
                *market,
                pillars,
                *quotes,
                calibration.smile.clone(),
                config.implied_vol,
            )?),
            _ => FittedSmile::Sabr(calibration.smile.clone()),
        };
        Ok(Self {
            pillars,
            calibration: Some(calibration),
            smile,
        })
    }
}

/// Calibrated smile for one market snapshot and quote set.
///
/// ```
/// use fxsmile::OptionType;
/// use fxsmile::surface::build_surface;
///
/// let surface = build_surface(
///     1.10, 0.05, 0.03, 0.5,
///     &[0.1030, 0.0990, 0.1000, 0.1060, 0.1150],
///     0.85,
/// )?;
/// let atm = surface.pillars().atm();
/// assert!((surface.volatility(atm)?.0 - 0.10).abs() < 5e-3);
/// let call = surface.price(atm, OptionType::Call)?;
/// assert!(call > 0.0);
/// # Ok::<(), fxsmile::FxSmileError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FxVolSurface {
    market: MarketSnapshot,
    quotes: VolatilitySmile,
    config: SurfaceConfig,
    fit: Fit,
}

impl FxVolSurface {
    /// Derive the pillar strikes and fit the configured model.
    ///
    /// # Errors
    /// Propagates strike-from-delta, calibration and wing-fit failures.
    pub fn new(market: MarketSnapshot, quotes: VolatilitySmile, config: SurfaceConfig) -> error::Result<Self> {
        let fit = Fit::run(&market, &quotes, &config)?;
        Ok(Self {
            market,
            quotes,
            config,
            fit,
        })
    }

    /// Replace the quotes. Refits only if they differ by value from the
    /// current quotes; returns whether a refit happened. On error the
    /// surface keeps its previous quotes and fit.
    ///
    /// # Errors
    /// As [`new`](Self::new).
    pub fn set_smile(&mut self, quotes: VolatilitySmile) -> error::Result<bool> {
        if quotes == self.quotes {
            return Ok(false);
        }
        self.fit = Fit::run(&self.market, &quotes, &self.config)?;
        self.quotes = quotes;

        #[cfg(feature = "logging")]
        tracing::debug!(quotes = ?self.quotes.vols(), "surface refitted");

        Ok(true)
    }

    /// Implied vol at `strike`.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`](crate::FxSmileError::InvalidInput)
    /// for a non-positive strike, or the smile's own evaluation error.
    pub fn volatility(&self, strike: f64) -> error::Result<Vol> {
        self.fit.smile.section().vol(strike)
    }

    /// Garman–Kohlhagen premium at the surface vol for `strike`.
    pub fn price(&self, strike: f64, option_type: OptionType) -> error::Result<f64> {
        let vol = self.volatility(strike)?;
        self.pricer().price(strike, vol.0, option_type)
    }

    /// Greeks at the surface vol for `strike`, holding that vol fixed.
    pub fn greeks(&self, strike: f64, option_type: OptionType) -> error::Result<Greeks> {
        let vol = self.volatility(strike)?;
        self.pricer().greeks(strike, vol.0, option_type)
    }

    /// Vol that reprices `target_price` at `strike`, using the surface's
    /// implied-vol bracket.
    ///
    /// # Errors
    /// Returns [`FxSmileError::NoRootInInterval`](crate::FxSmileError::NoRootInInterval)
    /// if the premium is out of reach of the bracket.
    pub fn implied_volatility(&self, strike: f64, target_price: f64, option_type: OptionType) -> error::Result<Vol> {
        self.pricer()
            .implied_volatility_with(strike, target_price, option_type, &self.config.implied_vol)
    }

    /// Butterfly scan of the fitted smile.
    pub fn is_arbitrage_free(&self) -> error::Result<ArbitrageReport> {
        self.fit.smile.section().is_arbitrage_free()
    }

    pub fn pricer(&self) -> GarmanKohlhagen {
        GarmanKohlhagen::new(self.market)
    }

    pub fn market(&self) -> &MarketSnapshot {
        &self.market
    }

    pub fn quotes(&self) -> &VolatilitySmile {
        &self.quotes
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    pub fn pillars(&self) -> &StrikePillars {
        &self.fit.pillars
    }

    /// The smile queries are routed to.
    pub fn smile(&self) -> &dyn SmileSection {
        self.fit.smile.section()
    }

    /// Calibration details; `None` for interpolated surfaces.
    pub fn calibration(&self) -> Option<&SabrCalibration> {
        self.fit.calibration.as_ref()
    }

    /// The SABR core; `None` for interpolated surfaces.
    pub fn sabr(&self) -> Option<&SabrSmile> {
        self.fit.calibration.as_ref().map(|c| &c.smile)
    }

    /// The wing smile; `None` unless the model is [`SmileModel::SabrWithWings`].
    pub fn wing(&self) -> Option<&WingSmile> {
        match &self.fit.smile {
            FittedSmile::Wing(w) => Some(w),
            _ => None,
        }
    }

    /// Put and call tail coefficients, if the surface has wings.
    pub fn tails(&self) -> Option<(TailCoefficients, TailCoefficients)> {
        self.wing().map(|w| (*w.put_tail(), *w.call_tail()))
    }
}

/// Build a SABR-with-wings surface from raw market numbers.
///
/// `smile` holds the 10P, 25P, ATM, 25C and 10C vols in that order.
///
/// # Errors
/// Returns [`FxSmileError::InvalidInput`](crate::FxSmileError::InvalidInput)
/// for invalid market data or a smile that is not five positive vols, and
/// otherwise as [`FxVolSurface::new`].
pub fn build_surface(
    spot: f64,
    domestic_rate: f64,
    foreign_rate: f64,
    term: f64,
    smile: &[f64],
    beta: f64,
) -> error::Result<FxVolSurface> {
    let market = MarketSnapshot::new(spot, domestic_rate, foreign_rate, term)?;
    let quotes = VolatilitySmile::from_slice(smile)?;
    FxVolSurface::new(
        market,
        quotes,
        SurfaceConfig {
            beta,
            ..SurfaceConfig::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FxSmileError;
    use crate::market::DeltaPillar;
    use crate::smile::SabrParams;
    use approx::assert_abs_diff_eq;

    fn market() -> MarketSnapshot {
        MarketSnapshot::new(1.10, 0.05, 0.03, 0.5).unwrap()
    }

    /// Quotes generated by a known SABR smile at their own pillar strikes.
    fn sabr_quotes() -> VolatilitySmile {
        let m = market();
        let sabr = SabrSmile::new(m.forward(), m.term(), SabrParams::new(0.1, 0.85, -0.3, 1.0).unwrap()).unwrap();
        let sfd = StrikeFromDelta::new(m);
        let mut quotes = VolatilitySmile::new([0.1; 5]).unwrap();
        for _ in 0..200 {
            let pillars = sfd.strike_vector(&quotes).unwrap();
            quotes = VolatilitySmile::new(pillars.strikes().map(|k| sabr.vol(k).unwrap().0)).unwrap();
        }
        quotes
    }

    fn surface(model: SmileModel) -> FxVolSurface {
        let config = SurfaceConfig {
            model,
            ..SurfaceConfig::default()
        };
        FxVolSurface::new(market(), sabr_quotes(), config).unwrap()
    }

    #[test]
    fn reproduces_quotes_at_pillars() {
        for model in [
            SmileModel::Sabr,
            SmileModel::SabrWithWings,
            SmileModel::Interpolated(Interpolation::default()),
        ] {
            let s = surface(model);
            for pillar in DeltaPillar::ALL {
                let k = s.pillars().strike(pillar);
                assert_abs_diff_eq!(s.volatility(k).unwrap().0, s.quotes().vol(pillar), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn accessors_follow_model() {
        let wings = surface(SmileModel::SabrWithWings);
        assert!(wings.wing().is_some());
        assert!(wings.tails().is_some());
        assert!(wings.calibration().is_some());

        let sabr = surface(SmileModel::Sabr);
        assert!(sabr.wing().is_none());
        assert!(sabr.sabr().is_some());

        let interp = surface(SmileModel::Interpolated(Interpolation::default()));
        assert!(interp.calibration().is_none());
        assert!(interp.sabr().is_none());
    }

    #[test]
    fn sabr_model_uses_sabr_in_the_wings() {
        let s = surface(SmileModel::Sabr);
        let k = 0.9 * s.pillars().k10p();
        assert_eq!(s.volatility(k).unwrap(), s.sabr().unwrap().vol(k).unwrap());
    }

    #[test]
    fn put_call_parity_at_surface_vols() {
        let s = surface(SmileModel::SabrWithWings);
        let m = s.market();
        for k in [0.95, 1.05, 1.11, 1.2, 1.3] {
            let c = s.price(k, OptionType::Call).unwrap();
            let p = s.price(k, OptionType::Put).unwrap();
            assert_abs_diff_eq!(c - p, m.spot() * m.foreign_discount() - k * m.domestic_discount(), epsilon = 1e-12);
        }
    }

    #[test]
    fn greeks_use_surface_vol() {
        let s = surface(SmileModel::SabrWithWings);
        let k = 0.97;
        let vol = s.volatility(k).unwrap().0;
        let expected = s.pricer().greeks(k, vol, OptionType::Put).unwrap();
        assert_eq!(s.greeks(k, OptionType::Put).unwrap(), expected);
    }

    #[test]
    fn implied_volatility_inverts_price() {
        let s = surface(SmileModel::SabrWithWings);
        for k in [0.95, 1.11, 1.3] {
            let vol = s.volatility(k).unwrap().0;
            let price = s.price(k, OptionType::Call).unwrap();
            let iv = s.implied_volatility(k, price, OptionType::Call).unwrap().0;
            assert_abs_diff_eq!(iv, vol, epsilon = 1e-9);
        }
    }

    #[test]
    fn set_smile_refits_only_on_change() {
        let mut s = surface(SmileModel::SabrWithWings);
        let before = *s.sabr().unwrap().params();
        assert!(!s.set_smile(*s.quotes()).unwrap());
        assert_eq!(s.sabr().unwrap().params(), &before);

        let mut vols = *s.quotes().vols();
        vols[4] += 0.004;
        assert!(s.set_smile(VolatilitySmile::new(vols).unwrap()).unwrap());
        assert_ne!(s.sabr().unwrap().params(), &before);
        assert_eq!(s.quotes().vols(), &vols);
    }

    #[test]
    fn failed_refit_keeps_previous_state() {
        let mut s = surface(SmileModel::SabrWithWings);
        let quotes = *s.quotes();
        // a delta inversion with a 250% vol is outside the supported domain
        let bad = VolatilitySmile::new([2.5, 0.1, 0.1, 0.1, 0.1]).unwrap();
        assert!(s.set_smile(bad).is_err());
        assert_eq!(s.quotes(), &quotes);
    }

    #[test]
    fn build_surface_validates_inputs() {
        assert!(matches!(
            build_surface(1.1, 0.05, 0.03, 0.5, &[0.1; 4], 0.85),
            Err(FxSmileError::InvalidInput { .. })
        ));
        assert!(matches!(
            build_surface(-1.1, 0.05, 0.03, 0.5, &[0.1; 5], 0.85),
            Err(FxSmileError::InvalidInput { .. })
        ));
        assert!(build_surface(1.1, 0.05, 0.03, 0.5, &[0.1; 5], 1.5).is_err());
    }

    #[test]
    fn surface_config_serde_round_trip() {
        let config = SurfaceConfig {
            model: SmileModel::Interpolated(Interpolation::PiecewiseLinear {
                flat_extrapolation: true,
            }),
            ..SurfaceConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SurfaceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
