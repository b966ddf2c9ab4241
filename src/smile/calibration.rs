//! Two-stage SABR calibration to a five-pillar FX smile.
//!
//! **Stage 1** builds a first guess with β fixed:
//! 1. ν₀ from a tenor table (short expiries need more vol-of-vol).
//! 2. α₀ by bisection so that σ(K_ATM) hits the ATM quote, with ρ pinned at 0.9999.
//! 3. ρ₀ by bisection so that σ(K_25C) − σ(K_25P) hits the quoted risk reversal.
//!    Without a sign change, ν₀ is scaled by 1.2, up if the model risk
//!    reversal falls short of the quote and a larger ν brings it closer, down
//!    otherwise. Steps 2–3 repeat at most `max_vovol_retries` times.
//!
//! **Stage 2** maps (α, ρ, ν) from boxes around the first guess onto the real
//! line and minimizes the weighted squared vol error at the five pillars with
//! Powell's method.

use serde::{Deserialize, Serialize};

use crate::delta::StrikePillars;
use crate::error::{self, FxSmileError};
use crate::market::{DeltaPillar, VolatilitySmile};
use crate::math::solver::{BisectionConfig, IntervalMap, bisection};
use crate::optim::{PowellConfig, powell};
use crate::smile::sabr::{SabrParams, SabrSmile, sabr_vol};
use crate::validate::{validate_interval, validate_positive};

/// Correlation used while solving for α₀.
const ALPHA_SEARCH_RHO: f64 = 0.9999;
/// α₀ bracket as multiples of σ_ATM·K_ATM^{1−β}.
const ALPHA_BRACKET: (f64, f64) = (0.01, 10.0);
/// ρ₀ bracket.
const RHO_BRACKET: (f64, f64) = (-0.9999, 0.99999);
/// Keeps the stage-2 start strictly inside the correlation box.
const RHO_EDGE: f64 = 1e-6;
/// Objective value for trial points where the expansion is not finite.
const PENALTY: f64 = 1e10;

/// Settings for [`calibrate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SabrCalibrationConfig {
    /// Weights of the squared vol errors, in pillar order.
    pub weights: [f64; 5],
    /// Maximum number of vol-of-vol rescalings in stage 1.
    pub max_vovol_retries: usize,
    /// Factor applied to ν₀ on each rescaling.
    pub vovol_scale: f64,
    /// Stage-2 α box as multiples of α₀.
    pub alpha_bounds: (f64, f64),
    /// Stage-2 ν box as multiples of ν₀.
    pub vovol_bounds: (f64, f64),
    /// Stage-2 ρ box.
    pub correlation_bounds: (f64, f64),
    /// Outer iteration cap of the minimizer.
    pub max_iter: usize,
    /// Fractional objective tolerance of the minimizer.
    pub ftol: f64,
}

impl Default for SabrCalibrationConfig {
    fn default() -> Self {
        Self {
            weights: [1.0, 1.0, 2.0, 1.0, 1.0],
            max_vovol_retries: 50,
            vovol_scale: 1.2,
            alpha_bounds: (0.7, 1.2),
            vovol_bounds: (0.5, 3.0),
            correlation_bounds: (-0.9999, 0.9999),
            max_iter: 500,
            ftol: 1e-14,
        }
    }
}

impl SabrCalibrationConfig {
    fn validate(&self) -> error::Result<()> {
        if self.weights.iter().any(|w| !w.is_finite() || *w < 0.0) || self.weights.iter().sum::<f64>() <= 0.0 {
            return Err(FxSmileError::InvalidInput {
                message: format!("calibration weights must be non-negative with a positive sum, got {:?}", self.weights),
            });
        }
        validate_positive(self.vovol_scale, "vol-of-vol scale")?;
        validate_interval(self.alpha_bounds.0, self.alpha_bounds.1, "alpha bounds")?;
        validate_interval(self.vovol_bounds.0, self.vovol_bounds.1, "vol-of-vol bounds")?;
        validate_interval(self.correlation_bounds.0, self.correlation_bounds.1, "correlation bounds")?;
        if self.alpha_bounds.0 <= 0.0 || self.vovol_bounds.0 <= 0.0 {
            return Err(FxSmileError::InvalidInput {
                message: "alpha and vol-of-vol bounds must be positive multiples".into(),
            });
        }
        if self.correlation_bounds.0 <= -1.0 || self.correlation_bounds.1 >= 1.0 {
            return Err(FxSmileError::InvalidInput {
                message: format!("correlation bounds must lie in (-1, 1), got {:?}", self.correlation_bounds),
            });
        }
        Ok(())
    }
}

/// Outcome of a SABR calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SabrCalibration {
    /// The calibrated smile.
    pub smile: SabrSmile,
    /// Stage-1 parameters the refinement started from.
    pub initial_guess: SabrParams,
    /// √(Σ wᵢ·(σ_model − σ_quote)² / Σ wᵢ) at the solution.
    pub weighted_rms: f64,
    /// Minimizer outer iterations.
    pub iterations: usize,
    /// Vol-of-vol rescalings needed in stage 1.
    pub vovol_retries: usize,
}

/// Stage-1 vol-of-vol by expiry bucket.
pub(crate) fn initial_vovol(expiry: f64) -> f64 {
    match expiry {
        t if t <= 2.0 / 52.0 => 5.0,
        t if t <= 1.0 / 12.0 => 3.0,
        t if t <= 0.25 => 2.0,
        t if t <= 0.5 => 1.5,
        t if t <= 1.0 => 1.0,
        t if t <= 2.0 => 0.6,
        t if t <= 3.0 => 0.4,
        _ => 0.25,
    }
}

fn divergence(message: String, rms_error: Option<f64>) -> FxSmileError {
    FxSmileError::CalibrationDivergence {
        message,
        model: "SABR",
        rms_error,
    }
}

/// Stage-1 result.
struct FirstGuess {
    params: SabrParams,
    retries: usize,
}

fn first_guess(
    forward: f64,
    expiry: f64,
    pillars: &StrikePillars,
    quotes: &VolatilitySmile,
    beta: f64,
    config: &SabrCalibrationConfig,
) -> error::Result<FirstGuess> {
    let bisect = BisectionConfig::new(1e-12, 100);
    let atm_vol = quotes.vol(DeltaPillar::Atm);
    let k_atm = pillars.atm();
    let target_rr = quotes.risk_reversal_25();
    let alpha_scale = atm_vol * k_atm.powf(1.0 - beta);

    let solve_alpha = |nu: f64| {
        bisection(
            |a| sabr_vol(forward, expiry, &SabrParams::from_parts(a, beta, ALPHA_SEARCH_RHO, nu), k_atm) - atm_vol,
            ALPHA_BRACKET.0 * alpha_scale,
            ALPHA_BRACKET.1 * alpha_scale,
            bisect,
        )
        .map_err(|_| divergence(format!("no alpha reproduces the ATM vol {atm_vol} with vol-of-vol {nu}"), None))
    };
    let model_rr = |alpha: f64, rho: f64, nu: f64| {
        let p = SabrParams::from_parts(alpha, beta, rho, nu);
        sabr_vol(forward, expiry, &p, pillars.k25c()) - sabr_vol(forward, expiry, &p, pillars.k25p())
    };
    let reach = |alpha: f64, nu: f64| (model_rr(alpha, RHO_BRACKET.0, nu), model_rr(alpha, RHO_BRACKET.1, nu));

    let mut nu = initial_vovol(expiry);
    let mut retries = 0;
    loop {
        let alpha = solve_alpha(nu)?;
        match bisection(|r| model_rr(alpha, r, nu) - target_rr, RHO_BRACKET.0, RHO_BRACKET.1, bisect) {
            Ok(rho) => {
                return Ok(FirstGuess {
                    params: SabrParams::from_parts(alpha, beta, rho, nu),
                    retries,
                });
            }
            Err(FxSmileError::NoRootInInterval { .. }) => {}
            Err(e) => return Err(e),
        }

        if retries == config.max_vovol_retries {
            return Err(divergence(
                format!(
                    "no correlation matches the 25-delta risk reversal {target_rr} after {retries} vol-of-vol adjustments"
                ),
                None,
            ));
        }
        retries += 1;

        let (rr_lo, rr_hi) = reach(alpha, nu);
        let shortfall = rr_shortfall(target_rr, rr_lo, rr_hi);
        let widened = nu * config.vovol_scale;
        let widened_shortfall = solve_alpha(widened)
            .ok()
            .map(|a| reach(a, widened))
            .map(|(lo, hi)| rr_shortfall(target_rr, lo, hi));

        #[cfg(feature = "logging")]
        tracing::warn!(retries, nu, rr_lo, rr_hi, target_rr, "SABR risk reversal not bracketed, rescaling vol-of-vol");

        nu = next_vovol(nu, config.vovol_scale, shortfall, widened_shortfall);
    }
}

/// Distance from `target` to the risk reversals reachable between the
/// correlation extremes; zero inside the range.
fn rr_shortfall(target: f64, rr_lo: f64, rr_hi: f64) -> f64 {
    let (lo, hi) = (rr_lo.min(rr_hi), rr_lo.max(rr_hi));
    if target > hi {
        target - hi
    } else if target < lo {
        lo - target
    } else {
        0.0
    }
}

/// Scale ν up if that brings the reachable risk reversal closer to the
/// quote, down otherwise.
fn next_vovol(nu: f64, scale: f64, shortfall: f64, widened_shortfall: Option<f64>) -> f64 {
    match widened_shortfall {
        Some(s) if s < shortfall => nu * scale,
        _ => nu / scale,
    }
}

/// Calibrate SABR with fixed `beta` to the five quoted pillars.
///
/// `pillars` are the strikes of `quotes` (see
/// [`StrikeFromDelta::strike_vector`](crate::delta::StrikeFromDelta::strike_vector)).
///
/// # Errors
/// Returns [`FxSmileError::InvalidInput`] for invalid forward, expiry, beta
/// or configuration, and [`FxSmileError::CalibrationDivergence`] if stage 1
/// exhausts its vol-of-vol retries or stage 2 does not converge.
pub fn calibrate(
    forward: f64,
    expiry: f64,
    pillars: &StrikePillars,
    quotes: &VolatilitySmile,
    beta: f64,
    config: &SabrCalibrationConfig,
) -> error::Result<SabrCalibration> {
    validate_positive(forward, "forward")?;
    validate_positive(expiry, "expiry")?;
    if !(0.0..=1.0).contains(&beta) {
        return Err(FxSmileError::InvalidInput {
            message: format!("beta must be in [0, 1], got {beta}"),
        });
    }
    config.validate()?;

    #[cfg(feature = "logging")]
    tracing::debug!(forward, expiry, beta, quotes = ?quotes.vols(), "SABR calibration started");

    let guess = first_guess(forward, expiry, pillars, quotes, beta, config)?;
    let g = guess.params;

    #[cfg(feature = "logging")]
    tracing::debug!(
        alpha = g.alpha(),
        rho = g.rho(),
        nu = g.nu(),
        retries = guess.retries,
        "SABR first guess"
    );

    let alpha_map = IntervalMap::new(config.alpha_bounds.0 * g.alpha(), config.alpha_bounds.1 * g.alpha())?;
    let rho_map = IntervalMap::new(config.correlation_bounds.0, config.correlation_bounds.1)?;
    let nu_map = IntervalMap::new(config.vovol_bounds.0 * g.nu(), config.vovol_bounds.1 * g.nu())?;

    let unmap = |y: &[f64]| {
        SabrParams::from_parts(alpha_map.from_real(y[0]), beta, rho_map.from_real(y[1]), nu_map.from_real(y[2]))
    };
    let strikes = pillars.strikes();
    let vols = quotes.vols();
    let objective = |y: &[f64]| {
        let p = unmap(y);
        let sse: f64 = (0..5)
            .map(|i| config.weights[i] * (sabr_vol(forward, expiry, &p, strikes[i]) - vols[i]).powi(2))
            .sum();
        if sse.is_finite() { sse } else { PENALTY }
    };

    let rho_start = g.rho().clamp(rho_map.lower + RHO_EDGE, rho_map.upper - RHO_EDGE);
    let start = [alpha_map.to_real(g.alpha()), rho_map.to_real(rho_start), nu_map.to_real(g.nu())];
    let powell_config = PowellConfig {
        max_iter: config.max_iter,
        ftol: config.ftol,
        ..PowellConfig::default()
    };
    let result = powell(objective, &start, &powell_config);

    let weight_sum: f64 = config.weights.iter().sum();
    let weighted_rms = (result.fval / weight_sum).sqrt();
    if !result.converged {
        return Err(divergence(
            format!("refinement did not converge in {} iterations", result.iterations),
            Some(weighted_rms),
        ));
    }

    let p = unmap(&result.x);
    let params = SabrParams::new(p.alpha(), beta, p.rho(), p.nu())
        .map_err(|e| divergence(format!("calibrated params invalid: {e}"), Some(weighted_rms)))?;

    #[cfg(feature = "logging")]
    tracing::debug!(
        alpha = params.alpha(),
        rho = params.rho(),
        nu = params.nu(),
        weighted_rms,
        iterations = result.iterations,
        "SABR calibration complete"
    );

    Ok(SabrCalibration {
        smile: SabrSmile::new(forward, expiry, params)?,
        initial_guess: g,
        weighted_rms,
        iterations: result.iterations,
        vovol_retries: guess.retries,
    })
}

impl SabrSmile {
    /// Calibrate to five pillar quotes with fixed `beta`; see [`calibrate`].
    ///
    /// # Errors
    /// As [`calibrate`].
    pub fn calibrate(
        forward: f64,
        expiry: f64,
        pillars: &StrikePillars,
        quotes: &VolatilitySmile,
        beta: f64,
        config: &SabrCalibrationConfig,
    ) -> error::Result<Self> {
        calibrate(forward, expiry, pillars, quotes, beta, config).map(|c| c.smile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::StrikeFromDelta;
    use crate::market::MarketSnapshot;
    use crate::smile::SmileSection;
    use approx::assert_abs_diff_eq;

    /// Pillar strikes and quotes that a given SABR smile reproduces exactly.
    fn consistent_quotes(market: MarketSnapshot, params: SabrParams) -> (StrikePillars, VolatilitySmile) {
        let sabr = SabrSmile::new(market.forward(), market.term(), params).unwrap();
        let sfd = StrikeFromDelta::new(market);
        let mut quotes = VolatilitySmile::new([0.1; 5]).unwrap();
        for _ in 0..200 {
            let pillars = sfd.strike_vector(&quotes).unwrap();
            quotes = VolatilitySmile::new(pillars.strikes().map(|k| sabr.vol(k).unwrap().0)).unwrap();
        }
        (sfd.strike_vector(&quotes).unwrap(), quotes)
    }

    #[test]
    fn initial_vovol_table() {
        assert_eq!(initial_vovol(1.0 / 52.0), 5.0);
        assert_eq!(initial_vovol(0.08), 3.0);
        assert_eq!(initial_vovol(0.25), 2.0);
        assert_eq!(initial_vovol(0.4), 1.5);
        assert_eq!(initial_vovol(1.0), 1.0);
        assert_eq!(initial_vovol(720.0 / 365.0), 0.6);
        assert_eq!(initial_vovol(2.5), 0.4);
        assert_eq!(initial_vovol(5.0), 0.25);
    }

    #[test]
    fn first_guess_matches_atm_and_risk_reversal() {
        let market = MarketSnapshot::new(1.10, 0.05, 0.03, 0.5).unwrap();
        let (pillars, quotes) = consistent_quotes(market, SabrParams::new(0.1, 0.85, -0.3, 1.0).unwrap());
        let f = market.forward();
        let g = first_guess(f, 0.5, &pillars, &quotes, 0.85, &SabrCalibrationConfig::default()).unwrap();
        let p = g.params;

        let atm = SabrParams::from_parts(p.alpha(), 0.85, ALPHA_SEARCH_RHO, p.nu());
        assert_abs_diff_eq!(sabr_vol(f, 0.5, &atm, pillars.atm()), quotes.vol(DeltaPillar::Atm), epsilon = 1e-9);
        let rr = sabr_vol(f, 0.5, &p, pillars.k25c()) - sabr_vol(f, 0.5, &p, pillars.k25p());
        assert_abs_diff_eq!(rr, quotes.risk_reversal_25(), epsilon = 1e-9);
        assert!(p.rho() > RHO_BRACKET.0 && p.rho() < RHO_BRACKET.1);
    }

    #[test]
    fn recovers_generating_parameters() {
        let market = MarketSnapshot::new(1.10, 0.05, 0.03, 0.5).unwrap();
        let truth = SabrParams::new(0.1, 0.85, -0.3, 1.0).unwrap();
        let (pillars, quotes) = consistent_quotes(market, truth);
        let cal = calibrate(market.forward(), 0.5, &pillars, &quotes, 0.85, &SabrCalibrationConfig::default()).unwrap();

        assert!(cal.weighted_rms < 1e-6, "rms = {}", cal.weighted_rms);
        for (k, q) in pillars.strikes().iter().zip(quotes.vols()) {
            assert_abs_diff_eq!(cal.smile.vol(*k).unwrap().0, *q, epsilon = 1e-5);
        }
        assert_eq!(cal.smile.beta(), 0.85);
    }

    #[test]
    fn unreachable_risk_reversal_diverges() {
        let market = MarketSnapshot::new(1.10, 0.05, 0.03, 0.5).unwrap();
        let quotes = VolatilitySmile::new([0.10, 0.10, 0.10, 0.60, 0.70]).unwrap();
        let pillars = StrikeFromDelta::new(market).strike_vector(&quotes).unwrap();
        let config = SabrCalibrationConfig {
            max_vovol_retries: 0,
            ..SabrCalibrationConfig::default()
        };
        let r = calibrate(market.forward(), 0.5, &pillars, &quotes, 0.85, &config);
        assert!(matches!(
            r,
            Err(FxSmileError::CalibrationDivergence { model: "SABR", .. })
        ));
    }

    #[test]
    fn steep_long_dated_skew_needs_vovol_retries() {
        let market = MarketSnapshot::new(1.10, 0.05, 0.03, 3.5).unwrap();
        let quotes = VolatilitySmile::new([0.16, 0.13, 0.10, 0.09, 0.09]).unwrap();
        let pillars = StrikeFromDelta::new(market).strike_vector(&quotes).unwrap();
        let cal = calibrate(market.forward(), 3.5, &pillars, &quotes, 0.85, &SabrCalibrationConfig::default()).unwrap();

        assert!(cal.vovol_retries > 0);
        assert!(cal.initial_guess.nu() > initial_vovol(3.5), "nu = {}", cal.initial_guess.nu());
        assert!(cal.initial_guess.rho() < 0.0);
        assert!(cal.weighted_rms < 1e-2, "rms = {}", cal.weighted_rms);
    }

    #[test]
    fn risk_reversal_shortfall() {
        assert_eq!(rr_shortfall(-0.01, -0.03, 0.02), 0.0);
        assert_abs_diff_eq!(rr_shortfall(-0.04, -0.03, 0.02), 0.01, epsilon = 1e-15);
        assert_abs_diff_eq!(rr_shortfall(0.05, 0.02, -0.03), 0.03, epsilon = 1e-15);
    }

    #[test]
    fn vovol_moves_toward_the_quote() {
        assert_abs_diff_eq!(next_vovol(0.5, 1.2, 0.02, Some(0.01)), 0.6, epsilon = 1e-15);
        assert_abs_diff_eq!(next_vovol(0.6, 1.2, 0.02, Some(0.03)), 0.5, epsilon = 1e-15);
        // no alpha at the larger vol-of-vol
        assert_abs_diff_eq!(next_vovol(0.6, 1.2, 0.02, None), 0.5, epsilon = 1e-15);
    }

    #[test]
    fn rejects_bad_configuration() {
        let market = MarketSnapshot::new(1.10, 0.05, 0.03, 0.5).unwrap();
        let quotes = VolatilitySmile::new([0.12, 0.11, 0.10, 0.11, 0.12]).unwrap();
        let pillars = StrikeFromDelta::new(market).strike_vector(&quotes).unwrap();
        let config = SabrCalibrationConfig {
            weights: [0.0; 5],
            ..SabrCalibrationConfig::default()
        };
        assert!(matches!(
            calibrate(market.forward(), 0.5, &pillars, &quotes, 0.85, &config),
            Err(FxSmileError::InvalidInput { .. })
        ));
        assert!(matches!(
            calibrate(market.forward(), 0.5, &pillars, &quotes, 1.5, &SabrCalibrationConfig::default()),
            Err(FxSmileError::InvalidInput { .. })
        ));
    }

    #[test]
    fn config_serde_round_trip() {
        let c = SabrCalibrationConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let back: SabrCalibrationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
