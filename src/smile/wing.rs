//! SABR core with analytic price tails beyond the 25-delta strikes.
//!
//! Below the 25-put strike the put price, and above the 25-call strike the
//! call price, follow
//!
//! ```text
//! P(K) = exp(m·ln K + a + b·K + c·K²)        (put tail)
//! C(K) = exp(−n·ln K + a + b/K + c/K²)       (call tail)
//! ```
//!
//! Each tail has four unknowns, fixed by an exact 4×4 solve: the log-price
//! and its first two strike derivatives at the 25-delta strike (taken from
//! the SABR core, chained through σ(K)), and the log-price at the 10-delta
//! strike priced at the quoted 10-delta vol. Prices and their first two
//! strike derivatives are therefore continuous at the 25-delta strikes.
//!
//! Tail prices are turned back into vols with the pricer's implied-vol
//! bisection.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};

use crate::delta::StrikePillars;
use crate::error::{self, FxSmileError};
use crate::market::{DeltaPillar, MarketSnapshot, VolatilitySmile};
use crate::pricing::{GarmanKohlhagen, ImpliedVolConfig};
use crate::smile::arbitrage::{ArbitrageReport, scan_density};
use crate::smile::{SabrSmile, SmileSection};
use crate::types::{OptionType, Vol};
use crate::validate::validate_positive;

/// Coefficients of one tail's log-price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailCoefficients {
    /// Put for the low-strike tail, call for the high-strike tail.
    pub side: OptionType,
    /// Power-law exponent (m for puts, n for calls).
    pub exponent: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl TailCoefficients {
    /// Basis functions of the log-price and their first two strike derivatives.
    fn basis(side: OptionType, k: f64) -> [[f64; 4]; 3] {
        match side {
            OptionType::Put => [
                [k.ln(), 1.0, k, k * k],
                [1.0 / k, 0.0, 1.0, 2.0 * k],
                [-1.0 / (k * k), 0.0, 0.0, 2.0],
            ],
            OptionType::Call => {
                let (k2, k3, k4) = (k * k, k * k * k, k * k * k * k);
                [
                    [-k.ln(), 1.0, 1.0 / k, 1.0 / k2],
                    [-1.0 / k, 0.0, -1.0 / k2, -2.0 / k3],
                    [1.0 / k2, 0.0, 2.0 / k3, 6.0 / k4],
                ]
            }
        }
    }

    /// Log-price g(K) and its first two strike derivatives.
    pub fn log_price(&self, strike: f64) -> (f64, f64, f64) {
        let coeffs = [self.exponent, self.a, self.b, self.c];
        let [g0, g1, g2] =
            Self::basis(self.side, strike).map(|row| row.iter().zip(&coeffs).map(|(r, c)| r * c).sum::<f64>());
        (g0, g1, g2)
    }

    /// Tail price in domestic currency.
    pub fn price(&self, strike: f64) -> f64 {
        self.log_price(strike).0.exp()
    }
}

/// SABR smile extended with analytic put and call tails.
#[derive(Debug, Clone)]
pub struct WingSmile {
    market: MarketSnapshot,
    pillars: StrikePillars,
    quotes: VolatilitySmile,
    sabr: SabrSmile,
    put_tail: TailCoefficients,
    call_tail: TailCoefficients,
    implied_vol: ImpliedVolConfig,
}

impl WingSmile {
    /// Fit both tails to a calibrated SABR core.
    ///
    /// # Errors
    /// Returns [`FxSmileError::NumericalError`] if a 4×4 system is singular or
    /// yields non-finite coefficients, and propagates pricing errors at the
    /// boundary strikes.
    pub fn fit(
        market: MarketSnapshot,
        pillars: StrikePillars,
        quotes: VolatilitySmile,
        sabr: SabrSmile,
        implied_vol: ImpliedVolConfig,
    ) -> error::Result<Self> {
        let gk = GarmanKohlhagen::new(market);
        let put_tail = fit_tail(
            &gk,
            &sabr,
            OptionType::Put,
            pillars.k25p(),
            pillars.k10p(),
            quotes.vol(DeltaPillar::Put10),
        )?;
        let call_tail = fit_tail(
            &gk,
            &sabr,
            OptionType::Call,
            pillars.k25c(),
            pillars.k10c(),
            quotes.vol(DeltaPillar::Call10),
        )?;

        #[cfg(feature = "logging")]
        tracing::debug!(?put_tail, ?call_tail, "wing tails fitted");

        Ok(Self {
            market,
            pillars,
            quotes,
            sabr,
            put_tail,
            call_tail,
            implied_vol,
        })
    }

    pub fn sabr(&self) -> &SabrSmile {
        &self.sabr
    }

    pub fn pillars(&self) -> &StrikePillars {
        &self.pillars
    }

    pub fn quotes(&self) -> &VolatilitySmile {
        &self.quotes
    }

    pub fn put_tail(&self) -> &TailCoefficients {
        &self.put_tail
    }

    pub fn call_tail(&self) -> &TailCoefficients {
        &self.call_tail
    }

    /// Whether `strike` is priced by a tail rather than the SABR core.
    pub fn in_wing(&self, strike: f64) -> bool {
        strike < self.pillars.k25p() || strike > self.pillars.k25c()
    }

    fn tail_for(&self, strike: f64) -> error::Result<&TailCoefficients> {
        if strike <= self.pillars.k25p() {
            Ok(&self.put_tail)
        } else if strike >= self.pillars.k25c() {
            Ok(&self.call_tail)
        } else {
            Err(FxSmileError::DomainError {
                message: format!(
                    "strike {strike} lies inside the SABR core ({}, {})",
                    self.pillars.k25p(),
                    self.pillars.k25c()
                ),
            })
        }
    }

    /// Vol implied by the tail price at `strike`: a put tail at or below the
    /// 25-put strike, a call tail at or above the 25-call strike.
    ///
    /// # Errors
    /// Returns [`FxSmileError::DomainError`] for strikes strictly between the
    /// 25-delta strikes and [`FxSmileError::NoRootInInterval`] if the tail
    /// price is outside the implied-vol bracket.
    pub fn implied_wing_vol(&self, strike: f64) -> error::Result<Vol> {
        validate_positive(strike, "strike")?;
        let tail = self.tail_for(strike)?;
        GarmanKohlhagen::new(self.market).implied_volatility_with(
            strike,
            tail.price(strike),
            tail.side,
            &self.implied_vol,
        )
    }
}

/// Solve one tail's 4×4 system.
fn fit_tail(
    gk: &GarmanKohlhagen,
    sabr: &SabrSmile,
    side: OptionType,
    boundary: f64,
    outer: f64,
    outer_vol: f64,
) -> error::Result<TailCoefficients> {
    let v = sabr.vol_derivatives(boundary)?;
    let g = gk.greeks(boundary, v.vol, side)?;
    let p = gk.price(boundary, v.vol, side)?;
    let p_outer = gk.price(outer, outer_vol, side)?;
    if p <= 0.0 || p_outer <= 0.0 {
        return Err(FxSmileError::NumericalError {
            message: format!("{side:?} tail anchors must have positive prices, got {p} and {p_outer}"),
        });
    }

    // Total strike derivatives of the price along the smile
    let p_k = g.dual_delta + g.vega * v.dvol;
    let p_kk = g.dual_gamma + 2.0 * g.dual_vega * v.dvol + g.volga * v.dvol * v.dvol + g.vega * v.d2vol;
    let slope = p_k / p;
    let rhs = Vector4::new(p.ln(), slope, p_kk / p - slope * slope, p_outer.ln());

    let [r0, r1, r2] = TailCoefficients::basis(side, boundary);
    let [r3, _, _] = TailCoefficients::basis(side, outer);
    let m = Matrix4::from_row_slice(&[r0, r1, r2, r3].concat());
    let x = m.lu().solve(&rhs).ok_or_else(|| FxSmileError::NumericalError {
        message: format!("singular {side:?} tail system at strikes {boundary} and {outer}"),
    })?;
    if x.iter().any(|c| !c.is_finite()) {
        return Err(FxSmileError::NumericalError {
            message: format!("non-finite {side:?} tail coefficients"),
        });
    }
    Ok(TailCoefficients {
        side,
        exponent: x[0],
        a: x[1],
        b: x[2],
        c: x[3],
    })
}

impl SmileSection for WingSmile {
    fn vol(&self, strike: f64) -> error::Result<Vol> {
        validate_positive(strike, "strike")?;
        if self.in_wing(strike) {
            self.implied_wing_vol(strike)
        } else {
            self.sabr.vol(strike)
        }
    }

    /// Analytic density. In a tail, ∂²P/∂K² = P·(g'' + g'²) for either side
    /// (calls and puts differ by a linear function of K), undiscounted at r_d.
    fn density(&self, strike: f64) -> error::Result<f64> {
        validate_positive(strike, "strike")?;
        if !self.in_wing(strike) {
            return self.sabr.density(strike);
        }
        let tail = self.tail_for(strike)?;
        let (g, g1, g2) = tail.log_price(strike);
        Ok(g.exp() * (g2 + g1 * g1) / self.market.domestic_discount())
    }

    fn forward(&self) -> f64 {
        self.market.forward()
    }

    fn expiry(&self) -> f64 {
        self.market.term()
    }

    /// Scan the density on 200 strikes from 10% below the 10-put strike to
    /// 10% above the 10-call strike.
    fn is_arbitrage_free(&self) -> error::Result<ArbitrageReport> {
        const N: usize = 200;
        Ok(scan_density(self, 0.9 * self.pillars.k10p(), 1.1 * self.pillars.k10c(), N))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::StrikeFromDelta;
    use crate::smile::SabrParams;
    use approx::assert_abs_diff_eq;

    const T: f64 = 0.5;

    /// SABR core plus 10-delta quotes half a vol point above the core.
    fn make_wing() -> WingSmile {
        let market = MarketSnapshot::new(1.10, 0.05, 0.03, T).unwrap();
        let sabr = SabrSmile::new(market.forward(), T, SabrParams::new(0.1, 0.85, -0.3, 1.0).unwrap()).unwrap();
        let sfd = StrikeFromDelta::new(market);
        let mut quotes = VolatilitySmile::new([0.1; 5]).unwrap();
        for _ in 0..200 {
            let strikes = sfd.strike_vector(&quotes).unwrap();
            let mut v = strikes.strikes().map(|k| sabr.vol(k).unwrap().0);
            v[0] += 0.005;
            v[4] += 0.005;
            quotes = VolatilitySmile::new(v).unwrap();
        }
        let pillars = sfd.strike_vector(&quotes).unwrap();
        WingSmile::fit(market, pillars, quotes, sabr, ImpliedVolConfig::default()).unwrap()
    }

    #[test]
    fn tails_meet_sabr_at_25_delta() {
        let w = make_wing();
        for k in [w.pillars().k25p(), w.pillars().k25c()] {
            let wing = w.implied_wing_vol(k).unwrap().0;
            let core = w.sabr().vol(k).unwrap().0;
            assert_abs_diff_eq!(wing, core, epsilon = 1e-8);
        }
    }

    #[test]
    fn tails_reprice_10_delta_quotes() {
        let w = make_wing();
        assert_abs_diff_eq!(
            w.implied_wing_vol(w.pillars().k10p()).unwrap().0,
            w.quotes().vol(DeltaPillar::Put10),
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(
            w.implied_wing_vol(w.pillars().k10c()).unwrap().0,
            w.quotes().vol(DeltaPillar::Call10),
            epsilon = 1e-8
        );
    }

    #[test]
    fn slope_is_continuous_at_boundaries() {
        let w = make_wing();
        let k = w.pillars().k25p();
        let h = 1e-5 * k;
        let f = |x: f64| w.implied_wing_vol(x).unwrap().0;
        // second-order one-sided difference from inside the put tail
        let left = (3.0 * f(k) - 4.0 * f(k - h) + f(k - 2.0 * h)) / (2.0 * h);
        let core = w.sabr().vol_derivatives(k).unwrap().dvol;
        assert!((left - core).abs() < 5e-4 * core.abs(), "{left} vs {core}");

        let k = w.pillars().k25c();
        let h = 1e-5 * k;
        let right = (-3.0 * f(k) + 4.0 * f(k + h) - f(k + 2.0 * h)) / (2.0 * h);
        let core = w.sabr().vol_derivatives(k).unwrap().dvol;
        assert!((right - core).abs() < 5e-4 * core.abs(), "{right} vs {core}");
    }

    #[test]
    fn dispatch_by_strike_range() {
        let w = make_wing();
        let p = *w.pillars();
        let inside = 0.5 * (p.k25p() + p.atm());
        assert_eq!(w.vol(inside).unwrap(), w.sabr().vol(inside).unwrap());
        let outside = 0.5 * (p.k10p() + p.k25p());
        assert_eq!(w.vol(outside).unwrap(), w.implied_wing_vol(outside).unwrap());
        assert!(matches!(w.implied_wing_vol(p.atm()), Err(FxSmileError::DomainError { .. })));
    }

    #[test]
    fn wing_vol_exceeds_core_when_10_delta_is_rich() {
        let w = make_wing();
        let k = w.pillars().k10p();
        assert!(w.vol(k).unwrap().0 > w.sabr().vol(k).unwrap().0);
    }

    #[test]
    fn tail_density_matches_finite_differences() {
        let w = make_wing();
        let disc = w.market.domestic_discount();
        for k in [0.97 * w.pillars().k10p(), 1.02 * w.pillars().k10c()] {
            let tail = w.tail_for(k).unwrap();
            let h = 1e-4 * k;
            let fd = (tail.price(k + h) - 2.0 * tail.price(k) + tail.price(k - h)) / (h * h) / disc;
            let analytic = w.density(k).unwrap();
            assert!((analytic - fd).abs() < 1e-4 * analytic.abs().max(1e-6), "{analytic} vs {fd}");
        }
    }

    #[test]
    fn log_price_derivatives_are_consistent() {
        let tail = TailCoefficients {
            side: OptionType::Call,
            exponent: 3.0,
            a: -2.0,
            b: 0.5,
            c: -0.1,
        };
        let k = 1.3;
        let h = 1e-5;
        let (_, g1, g2) = tail.log_price(k);
        let g = |x: f64| tail.log_price(x).0;
        assert_abs_diff_eq!(g1, (g(k + h) - g(k - h)) / (2.0 * h), epsilon = 1e-8);
        assert_abs_diff_eq!(g2, (g(k + h) - 2.0 * g(k) + g(k - h)) / (h * h), epsilon = 1e-4);
    }
}
