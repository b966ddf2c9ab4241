//! Single-tenor volatility smile models.
//!
//! A smile represents how implied volatility varies with strike at a fixed
//! expiry. All models implement the [`SmileSection`] trait.
//!
//! ## Models
//!
//! - [`SabrSmile`] — Hagan SABR with the Obłój leading term, 3 free parameters
//! - [`WingSmile`] — SABR core with analytic price tails beyond the 25-delta strikes
//! - [`InterpolatedSmile`] — spline or linear interpolation of the quotes in log-moneyness

pub mod arbitrage;
pub mod calibration;
pub mod interpolated;
pub mod sabr;
pub mod wing;

pub use arbitrage::{ArbitrageReport, ButterflyViolation};
pub use calibration::{SabrCalibration, SabrCalibrationConfig};
pub use interpolated::InterpolatedSmile;
pub use sabr::{SabrParams, SabrSmile};
pub use wing::{TailCoefficients, WingSmile};

use serde::{Deserialize, Serialize};

use crate::error;
use crate::pricing::GarmanKohlhagen;
use crate::types::{OptionType, Variance, Vol};
use crate::validate::validate_positive;

/// Relative strike bump for the finite-difference density.
const DENSITY_BUMP: f64 = 1e-4;

/// A single-tenor volatility smile.
///
/// # Thread Safety
/// All implementations must be `Send + Sync` for use in concurrent pricing.
///
/// # Error Handling
/// Methods return `Result` so implementations can report numerical failures
/// (e.g., negative variance, NaN) rather than panicking.
pub trait SmileSection: Send + Sync {
    /// Implied Black volatility σ at the given strike.
    fn vol(&self, strike: f64) -> error::Result<Vol>;

    /// Total Black variance σ²T at the given strike.
    fn variance(&self, strike: f64) -> error::Result<Variance> {
        let v = self.vol(strike)?;
        Ok(Variance(v.0 * v.0 * self.expiry()))
    }

    /// Risk-neutral probability density q(K) = ∂²C/∂K² of the undiscounted
    /// call (Breeden-Litzenberger).
    ///
    /// The default is a central second difference with a relative bump of
    /// 1e-4; models with strike derivatives in closed form override it.
    fn density(&self, strike: f64) -> error::Result<f64> {
        validate_positive(strike, "strike")?;
        let gk = GarmanKohlhagen::forward_measure(self.forward(), self.expiry())?;
        let call = |k: f64| -> error::Result<f64> { gk.price(k, self.vol(k)?.0, OptionType::Call) };
        let h = DENSITY_BUMP * strike;
        Ok((call(strike + h)? - 2.0 * call(strike)? + call(strike - h)?) / (h * h))
    }

    /// Forward price F at this tenor.
    fn forward(&self) -> f64;

    /// Time to expiry T in years.
    fn expiry(&self) -> f64;

    /// Check whether this smile is free of butterfly arbitrage.
    fn is_arbitrage_free(&self) -> error::Result<ArbitrageReport>;
}

/// Implied vol with its first two strike derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolDerivatives {
    /// σ(K)
    pub vol: f64,
    /// dσ/dK
    pub dvol: f64,
    /// d²σ/dK²
    pub d2vol: f64,
}

/// Density of the undiscounted Black call when the vol moves with the strike:
///
/// ```text
/// q = ∂²C/∂K² + 2·∂²C/∂K∂σ·σ' + ∂²C/∂σ²·σ'² + ∂C/∂σ·σ''
/// ```
pub(crate) fn black_density(forward: f64, expiry: f64, strike: f64, v: &VolDerivatives) -> error::Result<f64> {
    let gk = GarmanKohlhagen::forward_measure(forward, expiry)?;
    let sigma = v.vol;
    Ok(gk.dual_gamma(strike, sigma)?
        + 2.0 * gk.dual_vega(strike, sigma)? * v.dvol
        + gk.volga(strike, sigma)? * v.dvol * v.dvol
        + gk.vega(strike, sigma)? * v.d2vol)
}
