//! One-dimensional interpolation on strictly increasing knots.
//!
//! Two schemes: piecewise-linear and natural cubic spline. Outside the knot
//! range either the end value is held flat or the curve is continued linearly
//! with its end slope.
//!
//! The spline second-derivative system is solved with the Thomas algorithm
//! (O(n) tridiagonal elimination) under natural boundary conditions
//! S''(x₀) = S''(xₙ₋₁) = 0.

use serde::{Deserialize, Serialize};

use crate::error::{self, FxSmileError};

/// Interpolation scheme and extrapolation rule.
///
/// ```
/// use fxsmile::math::interp::{Interpolation, Interpolator};
///
/// let lin = Interpolator::new(
///     Interpolation::PiecewiseLinear { flat_extrapolation: true },
///     vec![1.0, 2.0, 4.0],
///     vec![10.0, 20.0, 0.0],
/// )?;
/// assert_eq!(lin.value(3.0), 10.0);
/// assert_eq!(lin.value(9.0), 0.0);
/// # Ok::<(), fxsmile::FxSmileError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interpolation {
    /// Straight lines between knots. Requires ≥ 2 knots.
    PiecewiseLinear { flat_extrapolation: bool },
    /// Natural cubic spline. Requires ≥ 3 knots.
    CubicSpline { flat_extrapolation: bool },
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::CubicSpline {
            flat_extrapolation: false,
        }
    }
}

impl Interpolation {
    fn flat_extrapolation(self) -> bool {
        match self {
            Interpolation::PiecewiseLinear { flat_extrapolation }
            | Interpolation::CubicSpline { flat_extrapolation } => flat_extrapolation,
        }
    }

    fn min_knots(self) -> usize {
        match self {
            Interpolation::PiecewiseLinear { .. } => 2,
            Interpolation::CubicSpline { .. } => 3,
        }
    }
}

/// Coefficients for one cubic polynomial interval.
///
/// On interval \[xᵢ, xᵢ₊₁\]: `S(x) = a + b·(x - xᵢ) + c·(x - xᵢ)² + d·(x - xᵢ)³`.
/// Piecewise-linear segments use `c = d = 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SegmentCoeff {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

/// A built interpolant over fixed knots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interpolator {
    scheme: Interpolation,
    xs: Vec<f64>,
    ys: Vec<f64>,
    coeffs: Vec<SegmentCoeff>,
}

impl Interpolator {
    /// Build an interpolant through `(xs[i], ys[i])`.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] if lengths differ, there are too
    /// few knots for the scheme, values are not finite, or `xs` is not
    /// strictly increasing.
    pub fn new(scheme: Interpolation, xs: Vec<f64>, ys: Vec<f64>) -> error::Result<Self> {
        if xs.len() != ys.len() {
            return Err(FxSmileError::InvalidInput {
                message: format!(
                    "knot abscissae and ordinates must have the same length, got {} and {}",
                    xs.len(),
                    ys.len()
                ),
            });
        }
        if xs.len() < scheme.min_knots() {
            return Err(FxSmileError::InvalidInput {
                message: format!(
                    "{scheme:?} requires at least {} knots, got {}",
                    scheme.min_knots(),
                    xs.len()
                ),
            });
        }
        if let Some(v) = xs.iter().chain(ys.iter()).find(|v| !v.is_finite()) {
            return Err(FxSmileError::InvalidInput {
                message: format!("knots must be finite, got {v}"),
            });
        }
        for (i, w) in xs.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(FxSmileError::InvalidInput {
                    message: format!(
                        "knots must be strictly increasing, but xs[{}]={} >= xs[{}]={}",
                        i,
                        w[0],
                        i + 1,
                        w[1]
                    ),
                });
            }
        }

        let coeffs = match scheme {
            Interpolation::PiecewiseLinear { .. } => linear_coefficients(&xs, &ys),
            Interpolation::CubicSpline { .. } => spline_coefficients(&xs, &ys),
        };

        Ok(Self {
            scheme,
            xs,
            ys,
            coeffs,
        })
    }

    pub fn scheme(&self) -> Interpolation {
        self.scheme
    }

    /// Evaluate the interpolant at `x`.
    pub fn value(&self, x: f64) -> f64 {
        let n = self.xs.len();
        let flat = self.scheme.flat_extrapolation();
        if x <= self.xs[0] {
            if flat {
                return self.ys[0];
            }
            return self.ys[0] + self.coeffs[0].b * (x - self.xs[0]);
        }
        if x >= self.xs[n - 1] {
            if flat {
                return self.ys[n - 1];
            }
            return self.ys[n - 1] + self.end_slope() * (x - self.xs[n - 1]);
        }
        let i = self.xs.partition_point(|&k| k < x) - 1;
        let dx = x - self.xs[i];
        let c = &self.coeffs[i];
        c.a + dx * (c.b + dx * (c.c + dx * c.d))
    }

    /// Slope of the last segment at the right-most knot.
    fn end_slope(&self) -> f64 {
        let n = self.xs.len();
        let h = self.xs[n - 1] - self.xs[n - 2];
        let c = &self.coeffs[n - 2];
        c.b + h * (2.0 * c.c + 3.0 * h * c.d)
    }
}

fn linear_coefficients(x: &[f64], y: &[f64]) -> Vec<SegmentCoeff> {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xw, yw)| SegmentCoeff {
            a: yw[0],
            b: (yw[1] - yw[0]) / (xw[1] - xw[0]),
            c: 0.0,
            d: 0.0,
        })
        .collect()
}

/// Solve the natural cubic spline tridiagonal system and return
/// per-interval coefficients.
fn spline_coefficients(x: &[f64], y: &[f64]) -> Vec<SegmentCoeff> {
    let n = x.len();
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // c[i] = S''(xᵢ)/2, with c[0] = c[n-1] = 0
    let mut c = vec![0.0; n];

    if n > 2 {
        let m = n - 2;
        let mut diag = vec![0.0; m];
        let mut rhs = vec![0.0; m];

        for j in 0..m {
            let i = j + 1;
            diag[j] = 2.0 * (h[i - 1] + h[i]);
            rhs[j] = 3.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        }

        // Forward sweep
        for j in 1..m {
            let w = h[j] / diag[j - 1];
            diag[j] -= w * h[j];
            rhs[j] -= w * rhs[j - 1];
        }

        // Back substitution
        c[m] = rhs[m - 1] / diag[m - 1];
        for j in (0..m - 1).rev() {
            let i = j + 1;
            c[i] = (rhs[j] - h[j + 1] * c[i + 1]) / diag[j];
        }
    }

    (0..n - 1)
        .map(|i| SegmentCoeff {
            a: y[i],
            b: (y[i + 1] - y[i]) / h[i] - h[i] * (2.0 * c[i] + c[i + 1]) / 3.0,
            c: c[i],
            d: (c[i + 1] - c[i]) / (3.0 * h[i]),
        })
        .collect()
}
