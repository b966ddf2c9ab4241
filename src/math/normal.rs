//! Standard normal distribution: density, cumulative and inverse cumulative.
//!
//! The cdf is built on an error-function approximation that switches between a
//! Taylor series (|x| < 3.6), an asymptotic expansion (3.6 ≤ |x| ≤ 5.4) and
//! saturation beyond. Two independent inverse-cdf algorithms are provided so one
//! can cross-check the other.
//!
//! # References
//! - Acklam, P.J. "An algorithm for computing the inverse normal cumulative
//!   distribution function" (2003)
//! - Moro, B. "The Full Monte", Risk (1995)
//! - Abramowitz, M. & Stegun, I. "Handbook of Mathematical Functions", 26.2.17

use crate::error::{self, FxSmileError};

/// 1/√(2π)
const ONE_OVER_ROOT_TWO_PI: f64 = 0.398_942_280_401_432_7;
/// 2/√π
const TWO_OVER_ROOT_PI: f64 = 1.128_379_167_095_512_6;

/// Standard normal density φ(x).
pub fn pdf(x: f64) -> f64 {
    ONE_OVER_ROOT_TWO_PI * (-0.5 * x * x).exp()
}

/// Standard normal cumulative distribution Φ(x).
///
/// Accurate to better than 1e-9 near the centre; saturates to exactly 0 or 1
/// for |x| > 5.4·√2.
///
/// ```
/// let p = fxsmile::math::normal::cdf(2.134);
/// assert!((p - 0.983578609590808).abs() < 1e-9);
/// ```
pub fn cdf(x: f64) -> f64 {
    0.5 * (erf(x / std::f64::consts::SQRT_2) + 1.0)
}

/// Error function with the series / asymptotic split described in the module docs.
pub fn erf(x: f64) -> f64 {
    /// Upper end of the series region.
    const SERIES_LIMIT: f64 = 3.6;
    /// Upper end of the asymptotic region; erf is 1 to double precision beyond.
    const ASYMPTOTIC_LIMIT: f64 = 5.4;
    /// Terms of the asymptotic expansion.
    const ASYMPTOTIC_TERMS: usize = 14;

    if x.is_nan() {
        return f64::NAN;
    }
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let value = if x == 0.0 {
        0.0
    } else if x < SERIES_LIMIT {
        // erf(x) = 2/√π · Σ (−1)ⁿ x^(2n+1) / (n!(2n+1)); term count grows with x
        let n_terms = if x < 0.5 {
            9
        } else {
            (46.0 * (x - 0.5) / 3.1).ceil() as usize + 9
        };
        let x2 = x * x;
        let mut term = 1.0;
        let mut sum = 1.0;
        for n in 1..=n_terms {
            let n = n as f64;
            term *= -x2 * (2.0 * n - 1.0) / (n * (2.0 * n + 1.0));
            sum += term;
        }
        sum * x * TWO_OVER_ROOT_PI
    } else if x <= ASYMPTOTIC_LIMIT {
        // erfc(x) ≈ e^(−x²)/(x√π) · Σ (−1)ⁿ (2n−1)!! / (2x²)ⁿ
        let four_x2 = 4.0 * x * x;
        let mut term = 1.0;
        let mut sum = 1.0;
        for n in 1..=ASYMPTOTIC_TERMS {
            let n = n as f64;
            term *= -(2.0 * n - 1.0) * (2.0 * n) / (four_x2 * n);
            sum += term;
        }
        1.0 - (-x * x).exp() * TWO_OVER_ROOT_PI * sum / (2.0 * x)
    } else {
        1.0
    };

    sign * value
}

/// Hastings polynomial approximation of Φ(x) (Abramowitz & Stegun 26.2.17).
///
/// Absolute error below 7.5e-8. Kept as an independent cdf family for
/// cross-validation of [`cdf`].
pub fn cdf_hastings(x: f64) -> f64 {
    let y = 1.0 / (1.0 + 0.231_641_9 * x.abs());
    let poly = y
        * (0.319_381_53
            + y * (-0.356_563_782 + y * (1.781_477_937 + y * (-1.821_255_978 + y * 1.330_274_429))));
    let tail = poly * pdf(x);
    if x > 0.0 { 1.0 - tail } else { tail }
}

/// Inverse standard normal cdf Φ⁻¹(p), Acklam's rational approximation.
///
/// Relative accuracy about 1.15e-9 across (0, 1). Returns `−∞`/`+∞` at the
/// end points.
///
/// # Errors
/// Returns [`FxSmileError::DomainError`] if `p` is outside \[0, 1\] or NaN.
pub fn inverse_cdf(p: f64) -> error::Result<f64> {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.02425;
    const P_HIGH: f64 = 1.0 - P_LOW;

    check_probability(p)?;
    if p == 0.0 {
        return Ok(f64::NEG_INFINITY);
    }
    if p == 1.0 {
        return Ok(f64::INFINITY);
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    let x = if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= P_HIGH {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    };
    Ok(x)
}

/// Inverse standard normal cdf via Beasley-Springer (centre) and Moro (tails).
///
/// # Errors
/// Returns [`FxSmileError::DomainError`] if `p` is outside \[0, 1\] or NaN.
pub fn inverse_cdf_moro(p: f64) -> error::Result<f64> {
    const A: [f64; 4] = [2.50662823884, -18.61500062529, 41.39119773534, -25.44106049637];
    const B: [f64; 4] = [-8.47351093090, 23.08336743743, -21.06224101826, 3.13082909833];
    const C: [f64; 9] = [
        0.3374754822726147,
        0.9761690190917186,
        0.1607979714918209,
        0.0276438810333863,
        0.0038405729373609,
        0.0003951896511919,
        0.0000321767881768,
        0.0000002888167364,
        0.0000003960315187,
    ];

    check_probability(p)?;
    if p == 0.0 {
        return Ok(f64::NEG_INFINITY);
    }
    if p == 1.0 {
        return Ok(f64::INFINITY);
    }

    let x = p - 0.5;
    if x.abs() < 0.42 {
        let y = x * x;
        return Ok(x * (((A[3] * y + A[2]) * y + A[1]) * y + A[0])
            / ((((B[3] * y + B[2]) * y + B[1]) * y + B[0]) * y + 1.0));
    }

    let r = if x > 0.0 { 1.0 - p } else { p };
    let s = (-r.ln()).ln();
    let value = C
        .iter()
        .rev()
        .fold(0.0, |acc, &c| c + s * acc);
    Ok(if x < 0.0 { -value } else { value })
}

fn check_probability(p: f64) -> error::Result<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(FxSmileError::DomainError {
            message: format!("probability must lie in [0, 1], got {p}"),
        });
    }
    Ok(())
}
