//! Bracketing root finder and the bounded-interval ↔ real-line bijection.
//!
//! The bijection lets an unconstrained minimizer search a box-constrained
//! parameter (for instance a correlation in (−1, 1)):
//!
//! ```text
//! y(x) = (x − m) / ((x − a)(x − b)),   m = (a + b)/2
//! ```
//!
//! maps (a, b) onto ℝ with y(m) = 0, y → +∞ as x → a⁺ and y → −∞ as x → b⁻.

use serde::{Deserialize, Serialize};

use crate::error::{self, FxSmileError};
use crate::validate::validate_interval;

/// Termination settings for [`bisection`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BisectionConfig {
    /// Stop once the bracket half-width falls below this value.
    pub tolerance: f64,
    /// Hard cap on halvings.
    pub max_iter: usize,
}

impl Default for BisectionConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iter: 40,
        }
    }
}

impl BisectionConfig {
    pub fn new(tolerance: f64, max_iter: usize) -> Self {
        Self { tolerance, max_iter }
    }
}

/// Find a root of `f` in `[lower, upper]` by repeated halving.
///
/// The estimate is always the end of the current bracket where `f ≤ 0`, so the
/// result is within `config.tolerance` of a root, not exact. Iteration stops on
/// a tolerance hit, an exact zero, or after `config.max_iter` halvings, whichever
/// comes first; the best estimate found is returned in every case.
///
/// # Errors
/// Returns [`FxSmileError::NoRootInInterval`] if `f(lower)` and `f(upper)` have
/// the same strict sign, or either is NaN.
///
/// ```
/// use fxsmile::math::solver::{bisection, BisectionConfig};
///
/// let root = bisection(|x| 2.0 * x - 8.2468642, 0.0, 7.0, BisectionConfig::new(1e-8, 40))?;
/// assert!((root - 4.1234321).abs() < 1e-7);
/// # Ok::<(), fxsmile::FxSmileError>(())
/// ```
pub fn bisection<F>(f: F, lower: f64, upper: f64, config: BisectionConfig) -> error::Result<f64>
where
    F: Fn(f64) -> f64,
{
    let f_lower = f(lower);
    let f_upper = f(upper);
    if f_lower.is_nan() || f_upper.is_nan() || f_lower * f_upper > 0.0 {
        return Err(FxSmileError::NoRootInInterval { lower, upper });
    }
    if f_lower == 0.0 {
        return Ok(lower);
    }

    // Orient the search so that f(root_est) < 0 and the root lies in [est, est + dx].
    let (mut root_est, mut dx) = if f_lower < 0.0 {
        (lower, upper - lower)
    } else {
        (upper, lower - upper)
    };

    for _ in 0..config.max_iter {
        dx *= 0.5;
        let mid = root_est + dx;
        let f_mid = f(mid);
        if f_mid <= 0.0 {
            root_est = mid;
        }
        if dx.abs() < config.tolerance || f_mid == 0.0 {
            break;
        }
    }
    Ok(root_est)
}

/// Real roots of `a·x² + b·x + c = 0`, returned as (plus-root, minus-root).
///
/// # Errors
/// Returns [`FxSmileError::DomainError`] if the discriminant is negative or
/// `a` is zero.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> error::Result<(f64, f64)> {
    let disc = b * b - 4.0 * a * c;
    if a == 0.0 || disc < 0.0 || !disc.is_finite() {
        return Err(FxSmileError::DomainError {
            message: format!("no real solution to {a}x² + {b}x + {c} = 0"),
        });
    }
    let sq = disc.sqrt();
    Ok(((-b + sq) / (2.0 * a), (-b - sq) / (2.0 * a)))
}

/// Map a point of the open interval (a, b) onto the real line.
///
/// End points map to ±`f64::MAX` rather than infinity so the result stays
/// usable as an optimizer coordinate.
pub fn interval_to_real(x: f64, a: f64, b: f64) -> f64 {
    if x <= a {
        f64::MAX
    } else if x >= b {
        -f64::MAX
    } else {
        (x - 0.5 * (a + b)) / ((x - a) * (x - b))
    }
}

/// Inverse of [`interval_to_real`]: map a real `y` into (a, b).
///
/// Solves `y·x² − (y(a+b) + 1)·x + (a·b·y + (a+b)/2) = 0` on the branch that
/// stays inside the interval. The discriminant simplifies to `1 + y²(b−a)²`,
/// and the root is evaluated in cancellation-free form. `y = 0` is the
/// midpoint by definition.
pub fn real_to_interval(y: f64, a: f64, b: f64) -> f64 {
    let mid = 0.5 * (a + b);
    if y == 0.0 {
        return mid;
    }
    let width = b - a;
    let w = y * width;
    if !w.is_finite() {
        return if y > 0.0 { a } else { b };
    }
    mid - y * width * width / (2.0 * (1.0 + (1.0 + w * w).sqrt()))
}

/// A bounded parameter domain with its real-line reparameterization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalMap {
    pub lower: f64,
    pub upper: f64,
}

impl IntervalMap {
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] unless `lower < upper`, both finite.
    pub fn new(lower: f64, upper: f64) -> error::Result<Self> {
        validate_interval(lower, upper, "parameter bounds")?;
        Ok(Self { lower, upper })
    }

    /// Bounded value → unconstrained coordinate.
    pub fn to_real(&self, x: f64) -> f64 {
        interval_to_real(x, self.lower, self.upper)
    }

    /// Unconstrained coordinate → bounded value.
    pub fn from_real(&self, y: f64) -> f64 {
        real_to_interval(y, self.lower, self.upper)
    }

    pub fn contains(&self, x: f64) -> bool {
        x > self.lower && x < self.upper
    }
}
