//! SABR (Stochastic Alpha Beta Rho) smile model.
//!
//! SABR models the forward price as a CEV process with stochastic volatility:
//!
//! ```text
//! dF = σ · F^β · dW₁
//! dσ = ν · σ · dW₂
//! dW₁·dW₂ = ρ dt
//! ```
//!
//! Implied vol is the expansion `σ(K) = I⁰(K)·(1 + I¹(K)·T)`, with Obłój's
//! leading term
//!
//! ```text
//! I⁰ = ν·ln(F/K) / χ(z),   z = ν·(F^{1−β} − K^{1−β}) / (α·(1−β)),
//! χ(z) = ln((√(1 − 2ρz + z²) + z − ρ) / (1 − ρ))
//! ```
//!
//! and Hagan's first-order correction
//!
//! ```text
//! I¹ = (1−β)²α² / (24·(FK)^{1−β}) + ρβνα / (4·(FK)^{(1−β)/2}) + (2 − 3ρ²)ν² / 24
//! ```
//!
//! The first two strike derivatives are available in closed form for every
//! branch of I⁰ (near the money, ν = 0, β = 1, general), which the wing fit
//! and the analytic density rely on.
//!
//! # References
//! - Hagan, P. et al. "Managing Smile Risk" (2002)
//! - Obłój, J. "Fine-tune your smile: Correction to Hagan et al." (2008)

use serde::{Deserialize, Serialize};

use crate::error::{self, FxSmileError};
use crate::smile::arbitrage::{ArbitrageReport, scan_density};
use crate::smile::{SmileSection, VolDerivatives, black_density};
use crate::types::Vol;
use crate::validate::{validate_non_negative, validate_positive};

/// CEV exponent used when none is given.
pub const DEFAULT_BETA: f64 = 0.85;

/// Below this |ln(K/F)| the leading term switches to its expansion around the forward.
const ATM_LOG_MONEYNESS: f64 = 1e-5;

/// SABR parameters {α, β, ρ, ν}.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SabrParamsRaw", into = "SabrParamsRaw")]
pub struct SabrParams {
    /// Short-vol scale α > 0.
    alpha: f64,
    /// CEV exponent β ∈ \[0, 1\].
    beta: f64,
    /// Spot-vol correlation ρ ∈ (−1, 1).
    rho: f64,
    /// Vol-of-vol ν ≥ 0.
    nu: f64,
}

#[derive(Serialize, Deserialize)]
struct SabrParamsRaw {
    alpha: f64,
    beta: f64,
    rho: f64,
    nu: f64,
}

impl TryFrom<SabrParamsRaw> for SabrParams {
    type Error = FxSmileError;
    fn try_from(raw: SabrParamsRaw) -> Result<Self, Self::Error> {
        Self::new(raw.alpha, raw.beta, raw.rho, raw.nu)
    }
}

impl From<SabrParams> for SabrParamsRaw {
    fn from(p: SabrParams) -> Self {
        Self {
            alpha: p.alpha,
            beta: p.beta,
            rho: p.rho,
            nu: p.nu,
        }
    }
}

impl SabrParams {
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] if α ≤ 0, β ∉ \[0, 1\],
    /// |ρ| ≥ 1 or ν < 0, or any value is not finite.
    pub fn new(alpha: f64, beta: f64, rho: f64, nu: f64) -> error::Result<Self> {
        validate_positive(alpha, "alpha")?;
        if !(0.0..=1.0).contains(&beta) {
            return Err(FxSmileError::InvalidInput {
                message: format!("beta must be in [0, 1], got {beta}"),
            });
        }
        if rho.abs() >= 1.0 || rho.is_nan() {
            return Err(FxSmileError::InvalidInput {
                message: format!("rho must be in (-1, 1), got {rho}"),
            });
        }
        validate_non_negative(nu, "nu")?;
        Ok(Self::from_parts(alpha, beta, rho, nu))
    }

    /// Unchecked construction for optimizer trial points.
    pub(crate) fn from_parts(alpha: f64, beta: f64, rho: f64, nu: f64) -> Self {
        Self { alpha, beta, rho, nu }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn nu(&self) -> f64 {
        self.nu
    }
}

/// SABR implied vol and its strike derivatives, without input checks.
pub(crate) fn expansion(forward: f64, expiry: f64, p: &SabrParams, strike: f64) -> VolDerivatives {
    let (i0, i0_k, i0_kk) = leading_term(forward, p, strike);
    let (i1, i1_k, i1_kk) = correction_term(forward, p, strike);
    let m = 1.0 + i1 * expiry;
    VolDerivatives {
        vol: i0 * m,
        dvol: i0_k * m + i0 * i1_k * expiry,
        d2vol: i0_kk * m + 2.0 * i0_k * i1_k * expiry + i0 * i1_kk * expiry,
    }
}

/// SABR implied vol without input checks.
pub(crate) fn sabr_vol(forward: f64, expiry: f64, p: &SabrParams, strike: f64) -> f64 {
    expansion(forward, expiry, p, strike).vol
}

/// I⁰ and its first two strike derivatives.
fn leading_term(forward: f64, p: &SabrParams, strike: f64) -> (f64, f64, f64) {
    let SabrParams { alpha, beta, rho, nu } = *p;
    let gamma = 1.0 - beta;
    let y = (strike / forward).ln();

    if y.abs() < ATM_LOG_MONEYNESS {
        // I⁰ = A / (1 − c₁y + c₂y² + O(y³)) in y = ln(K/F)
        let a = alpha * forward.powf(-gamma);
        let lambda = nu * forward.powf(gamma) / alpha;
        let c1 = 0.5 * (rho * lambda - gamma);
        let c2 = gamma * gamma / 6.0 - 0.5 * rho * lambda * gamma + (3.0 * rho * rho - 1.0) * lambda * lambda / 6.0;
        let g = 1.0 - c1 * y + c2 * y * y;
        let g_y = -c1 + 2.0 * c2 * y;
        let i0 = a / g;
        let i0_y = -a * g_y / (g * g);
        let i0_yy = a * (2.0 * g_y * g_y / (g * g * g) - 2.0 * c2 / (g * g));
        return (i0, i0_y / strike, (i0_yy - i0_y) / (strike * strike));
    }

    // x = ln(F/K) and its strike derivatives
    let x = -y;
    let x_k = -1.0 / strike;
    let x_kk = 1.0 / (strike * strike);

    if nu == 0.0 {
        if gamma == 0.0 {
            return (alpha, 0.0, 0.0);
        }
        // CEV limit: I⁰ = αγ·x / (F^γ − K^γ)
        let d = forward.powf(gamma) - strike.powf(gamma);
        let d_k = -gamma * strike.powf(-beta);
        let d_kk = gamma * beta * strike.powf(-beta - 1.0);
        let ag = alpha * gamma;
        return quotient((ag * x, ag * x_k, ag * x_kk), (d, d_k, d_kk));
    }

    let z = if gamma == 0.0 {
        nu * x / alpha
    } else {
        nu * (forward.powf(gamma) - strike.powf(gamma)) / (alpha * gamma)
    };
    let z_k = -nu / alpha * strike.powf(-beta);
    let z_kk = nu * beta / alpha * strike.powf(-beta - 1.0);

    let u = 1.0 - 2.0 * rho * z + z * z;
    let chi_z = 1.0 / u.sqrt();
    let chi_zz = -(z - rho) * chi_z / u;
    let chi_k = chi_z * z_k;
    let chi_kk = chi_zz * z_k * z_k + chi_z * z_kk;

    quotient((nu * x, nu * x_k, nu * x_kk), (chi(z, rho), chi_k, chi_kk))
}

/// I¹ and its first two strike derivatives.
fn correction_term(forward: f64, p: &SabrParams, strike: f64) -> (f64, f64, f64) {
    let SabrParams { alpha, beta, rho, nu } = *p;
    let gamma = 1.0 - beta;
    let fk = forward * strike;
    let fk_full = fk.powf(-gamma);
    let fk_half = fk.powf(-0.5 * gamma);

    let a = gamma * gamma * alpha * alpha / 24.0;
    let b = rho * beta * nu * alpha / 4.0;
    let c = (2.0 - 3.0 * rho * rho) * nu * nu / 24.0;

    let i1 = a * fk_full + b * fk_half + c;
    let i1_k = -(gamma * a * fk_full + 0.5 * gamma * b * fk_half) / strike;
    let i1_kk = (gamma * (1.0 + gamma) * a * fk_full + 0.25 * gamma * (2.0 + gamma) * b * fk_half) / (strike * strike);
    (i1, i1_k, i1_kk)
}

/// χ(z) = ln((√(1 − 2ρz + z²) + z − ρ) / (1 − ρ)), evaluated without
/// cancellation for small |z| and for large negative z.
fn chi(z: f64, rho: f64) -> f64 {
    let s = (1.0 - 2.0 * rho * z + z * z).sqrt();
    let s_minus_one = (z * z - 2.0 * rho * z) / (s + 1.0);
    if z >= 0.0 {
        ((s_minus_one + z) / (1.0 - rho)).ln_1p()
    } else {
        -((s_minus_one - z) / (1.0 + rho)).ln_1p()
    }
}

/// Value and first two derivatives of n/d.
fn quotient(n: (f64, f64, f64), d: (f64, f64, f64)) -> (f64, f64, f64) {
    let q = n.0 / d.0;
    let q1 = (n.1 - q * d.1) / d.0;
    let q2 = (n.2 - 2.0 * q1 * d.1 - q * d.2) / d.0;
    (q, q1, q2)
}

/// SABR volatility smile at one expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SabrSmileRaw", into = "SabrSmileRaw")]
pub struct SabrSmile {
    forward: f64,
    expiry: f64,
    params: SabrParams,
}

#[derive(Serialize, Deserialize)]
struct SabrSmileRaw {
    forward: f64,
    expiry: f64,
    params: SabrParams,
}

impl TryFrom<SabrSmileRaw> for SabrSmile {
    type Error = FxSmileError;
    fn try_from(raw: SabrSmileRaw) -> Result<Self, Self::Error> {
        Self::new(raw.forward, raw.expiry, raw.params)
    }
}

impl From<SabrSmile> for SabrSmileRaw {
    fn from(s: SabrSmile) -> Self {
        Self {
            forward: s.forward,
            expiry: s.expiry,
            params: s.params,
        }
    }
}

impl SabrSmile {
    /// Create a SABR smile from calibrated parameters.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] if forward or expiry is
    /// non-positive.
    pub fn new(forward: f64, expiry: f64, params: SabrParams) -> error::Result<Self> {
        validate_positive(forward, "forward")?;
        validate_positive(expiry, "expiry")?;
        Ok(Self {
            forward,
            expiry,
            params,
        })
    }

    pub fn params(&self) -> &SabrParams {
        &self.params
    }

    pub fn alpha(&self) -> f64 {
        self.params.alpha
    }

    pub fn beta(&self) -> f64 {
        self.params.beta
    }

    pub fn rho(&self) -> f64 {
        self.params.rho
    }

    pub fn nu(&self) -> f64 {
        self.params.nu
    }

    /// Implied vol with its first and second strike derivatives.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a non-positive strike and
    /// [`FxSmileError::NumericalError`] if the expansion breaks down (a
    /// non-positive or non-finite vol).
    pub fn vol_derivatives(&self, strike: f64) -> error::Result<VolDerivatives> {
        validate_positive(strike, "strike")?;
        let v = expansion(self.forward, self.expiry, &self.params, strike);
        if !(v.vol.is_finite() && v.vol > 0.0 && v.dvol.is_finite() && v.d2vol.is_finite()) {
            return Err(FxSmileError::NumericalError {
                message: format!("SABR expansion breaks down at strike {strike}: vol = {}", v.vol),
            });
        }
        Ok(v)
    }
}

impl SmileSection for SabrSmile {
    fn vol(&self, strike: f64) -> error::Result<Vol> {
        Ok(Vol(self.vol_derivatives(strike)?.vol))
    }

    /// Analytic Breeden-Litzenberger density, chaining the Black strike
    /// Greeks through σ'(K) and σ''(K).
    fn density(&self, strike: f64) -> error::Result<f64> {
        let v = self.vol_derivatives(strike)?;
        black_density(self.forward, self.expiry, strike, &v)
    }

    fn forward(&self) -> f64 {
        self.forward
    }

    fn expiry(&self) -> f64 {
        self.expiry
    }

    /// Scan the density on 200 strikes within ±4 ATM standard deviations
    /// of the forward.
    fn is_arbitrage_free(&self) -> error::Result<ArbitrageReport> {
        const N: usize = 200;
        const WIDTH: f64 = 4.0;
        let sd = self.vol(self.forward)?.0 * self.expiry.sqrt();
        let lower = self.forward * (-WIDTH * sd).exp();
        let upper = self.forward * (WIDTH * sd).exp();
        Ok(scan_density(self, lower, upper, N))
    }
}
