//! FX market conventions.
//!
//! Forward from covered interest parity and the log-moneyness used by the
//! interpolated smile.

/// Outright forward from continuously compounded deposit rates:
/// F = S · exp((r_d − r_f) · T).
///
/// ```
/// let f = fxsmile::conventions::forward_price(100.0, 0.01, 0.05, 0.7);
/// assert!((f - 97.2388366801247).abs() < 1e-10);
/// ```
pub fn forward_price(spot: f64, domestic_rate: f64, foreign_rate: f64, term: f64) -> f64 {
    spot * ((domestic_rate - foreign_rate) * term).exp()
}

/// Convert a strike to log-moneyness against a reference level: k = ln(K / ref).
pub fn log_moneyness(strike: f64, reference: f64) -> f64 {
    (strike / reference).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn forward_equals_spot_for_equal_rates() {
        assert_abs_diff_eq!(forward_price(1.25, 0.03, 0.03, 2.0), 1.25, epsilon = 1e-15);
    }

    #[test]
    fn log_moneyness_transform() {
        assert_abs_diff_eq!(log_moneyness(110.0, 100.0), 1.1_f64.ln(), epsilon = 1e-15);
    }
}
