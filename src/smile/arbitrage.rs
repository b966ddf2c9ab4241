//! Butterfly-arbitrage diagnostics for volatility smiles.
//!
//! Butterfly arbitrage occurs when the risk-neutral density implied by option
//! prices becomes negative. Smiles report it by scanning their density on a
//! strike grid.
//!
//! # References
//! - Breeden, D.T. & Litzenberger, R.H. "Prices of State-Contingent Claims
//!   Implicit in Option Prices" (1978)

use serde::{Deserialize, Serialize};

use crate::smile::SmileSection;

/// Densities below `-DENSITY_TOL` count as violations.
const DENSITY_TOL: f64 = 1e-10;

/// Report on arbitrage-freeness of a smile or surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageReport {
    /// Whether the smile/surface is free of detected arbitrage.
    pub is_free: bool,
    /// Butterfly spread violations (negative density regions).
    pub butterfly_violations: Vec<ButterflyViolation>,
}

impl ArbitrageReport {
    /// Create a report indicating no arbitrage was found.
    pub fn clean() -> Self {
        Self {
            is_free: true,
            butterfly_violations: Vec::new(),
        }
    }

    fn from_violations(butterfly_violations: Vec<ButterflyViolation>) -> Self {
        Self {
            is_free: butterfly_violations.is_empty(),
            butterfly_violations,
        }
    }

    /// Merge two reports, combining all violations.
    ///
    /// ```
    /// use fxsmile::smile::{ArbitrageReport, ButterflyViolation};
    ///
    /// let violated = ArbitrageReport {
    ///     is_free: false,
    ///     butterfly_violations: vec![ButterflyViolation {
    ///         strike: 1.02, density: -0.3, magnitude: 0.3,
    ///     }],
    /// };
    /// let merged = ArbitrageReport::clean().merge(&violated);
    /// assert!(!merged.is_free);
    /// assert_eq!(merged.butterfly_violations.len(), 1);
    /// ```
    pub fn merge(&self, other: &ArbitrageReport) -> ArbitrageReport {
        let mut violations = self.butterfly_violations.clone();
        violations.extend(other.butterfly_violations.iter().cloned());
        ArbitrageReport {
            is_free: self.is_free && other.is_free,
            butterfly_violations: violations,
        }
    }

    /// Return the worst (largest magnitude) butterfly violation, if any.
    pub fn worst_violation(&self) -> Option<&ButterflyViolation> {
        self.butterfly_violations.iter().max_by(|a, b| a.magnitude.total_cmp(&b.magnitude))
    }
}

/// A butterfly spread arbitrage violation at a specific strike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButterflyViolation {
    /// Strike where the violation occurs.
    pub strike: f64,
    /// Risk-neutral density value (negative indicates violation).
    pub density: f64,
    /// Absolute magnitude of the violation.
    pub magnitude: f64,
}

/// Evaluate the density on `n` log-spaced strikes in `[lower, upper]` and
/// collect the negative points. Strikes where the smile cannot be evaluated
/// are skipped.
pub(crate) fn scan_density<S: SmileSection + ?Sized>(smile: &S, lower: f64, upper: f64, n: usize) -> ArbitrageReport {
    let (ln_lo, ln_hi) = (lower.ln(), upper.ln());
    let violations = (0..n)
        .filter_map(|i| {
            let strike = (ln_lo + (ln_hi - ln_lo) * i as f64 / (n - 1).max(1) as f64).exp();
            match smile.density(strike) {
                Ok(d) if d < -DENSITY_TOL => Some(ButterflyViolation {
                    strike,
                    density: d,
                    magnitude: d.abs(),
                }),
                _ => None,
            }
        })
        .collect();
    ArbitrageReport::from_violations(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error;
    use crate::types::Vol;

    fn make_violation(strike: f64, density: f64) -> ButterflyViolation {
        ButterflyViolation {
            strike,
            density,
            magnitude: density.abs(),
        }
    }

    fn violated_report() -> ArbitrageReport {
        ArbitrageReport {
            is_free: false,
            butterfly_violations: vec![make_violation(0.95, -0.001), make_violation(1.05, -0.005)],
        }
    }

    /// Density is negative strictly between 1.0 and 1.2.
    struct DipSmile;

    impl SmileSection for DipSmile {
        fn vol(&self, _strike: f64) -> error::Result<Vol> {
            Ok(Vol(0.1))
        }
        fn density(&self, strike: f64) -> error::Result<f64> {
            Ok(if strike > 1.0 && strike < 1.2 { -0.5 } else { 0.5 })
        }
        fn forward(&self) -> f64 {
            1.1
        }
        fn expiry(&self) -> f64 {
            1.0
        }
        fn is_arbitrage_free(&self) -> error::Result<ArbitrageReport> {
            Ok(scan_density(self, 0.8, 1.4, 61))
        }
    }

    #[test]
    fn merge_clean_and_violated() {
        let merged = ArbitrageReport::clean().merge(&violated_report());
        assert!(!merged.is_free);
        assert_eq!(merged.butterfly_violations.len(), 2);

        let merged = violated_report().merge(&violated_report());
        assert_eq!(merged.butterfly_violations.len(), 4);
        assert!(ArbitrageReport::clean().merge(&ArbitrageReport::clean()).is_free);
    }

    #[test]
    fn worst_violation_picks_largest_magnitude() {
        assert!(ArbitrageReport::clean().worst_violation().is_none());
        let worst = violated_report();
        let worst = worst.worst_violation().unwrap();
        assert_eq!(worst.strike, 1.05);
        assert_eq!(worst.magnitude, 0.005);
    }

    #[test]
    fn scan_finds_negative_region_only() {
        let report = DipSmile.is_arbitrage_free().unwrap();
        assert!(!report.is_free);
        assert!(!report.butterfly_violations.is_empty());
        for v in &report.butterfly_violations {
            assert!(v.strike > 1.0 && v.strike < 1.2, "unexpected violation at {}", v.strike);
        }
    }

    #[test]
    fn report_serde_round_trip() {
        let json = serde_json::to_string(&violated_report()).unwrap();
        let back: ArbitrageReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.butterfly_violations.len(), 2);
        assert!(!back.is_free);
    }
}
