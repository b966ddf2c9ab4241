//! Internal optimization utilities for smile calibration.
//!
//! Powell's direction-set method with a Brent line search. Derivative free,
//! so it works on the SABR objective after the parameters have been mapped
//! onto the real line.

/// Configuration for the Powell direction-set optimizer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PowellConfig {
    /// Maximum number of outer iterations (full sweeps over all directions).
    pub max_iter: usize,
    /// Fractional tolerance on the objective value between sweeps.
    pub ftol: f64,
    /// Fractional tolerance of each line minimization.
    pub line_tol: f64,
    /// Iteration cap for each Brent line minimization.
    pub line_max_iter: usize,
}

impl Default for PowellConfig {
    fn default() -> Self {
        Self {
            max_iter: 500,
            ftol: 1e-14,
            line_tol: 2e-8,
            line_max_iter: 100,
        }
    }
}

/// Result of a Powell minimization.
#[derive(Debug, Clone)]
pub(crate) struct PowellResult {
    /// Best point found.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub fval: f64,
    /// Outer iterations performed.
    pub iterations: usize,
    /// Whether the fractional-decrease criterion was met before `max_iter`.
    pub converged: bool,
}

const TINY: f64 = 1e-20;
const GOLD: f64 = 1.618034;
const GLIMIT: f64 = 100.0;
const CGOLD: f64 = 0.381966;
const ZEPS: f64 = 1e-10;
const BRACKET_MAX_ITER: usize = 200;

/// Minimize `objective` starting from `x0`, using the unit vectors as the
/// initial direction set.
pub(crate) fn powell<F>(objective: F, x0: &[f64], config: &PowellConfig) -> PowellResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    let mut directions: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut d = vec![0.0; n];
            d[i] = 1.0;
            d
        })
        .collect();

    let mut p = x0.to_vec();
    let mut fret = objective(&p);
    let mut pt = p.clone();

    for iteration in 1..=config.max_iter {
        let fp = fret;
        let mut ibig = 0;
        let mut largest_decrease = 0.0;

        for (i, dir) in directions.iter_mut().enumerate() {
            let fptt = fret;
            fret = line_minimize(&objective, &mut p, dir, config);
            if fptt - fret > largest_decrease {
                largest_decrease = fptt - fret;
                ibig = i;
            }
        }

        if 2.0 * (fp - fret) <= config.ftol * (fp.abs() + fret.abs()) + TINY {
            return PowellResult {
                x: p,
                fval: fret,
                iterations: iteration,
                converged: true,
            };
        }

        // Extrapolated point and average direction moved this sweep
        let ptt: Vec<f64> = p.iter().zip(&pt).map(|(a, b)| 2.0 * a - b).collect();
        let mut xit: Vec<f64> = p.iter().zip(&pt).map(|(a, b)| a - b).collect();
        pt.clone_from(&p);

        let fptt = objective(&ptt);
        if fptt < fp {
            let t = 2.0 * (fp - 2.0 * fret + fptt) * (fp - fret - largest_decrease).powi(2)
                - largest_decrease * (fp - fptt).powi(2);
            if t < 0.0 {
                fret = line_minimize(&objective, &mut p, &mut xit, config);
                directions[ibig] = directions[n - 1].clone();
                directions[n - 1] = xit;
            }
        }
    }

    PowellResult {
        x: p,
        fval: fret,
        iterations: config.max_iter,
        converged: false,
    }
}

/// Minimize along `dir` from `p`. On return `p` is the minimizer, `dir` is the
/// actual displacement taken, and the minimum value is returned.
fn line_minimize<F>(objective: &F, p: &mut [f64], dir: &mut [f64], config: &PowellConfig) -> f64
where
    F: Fn(&[f64]) -> f64,
{
    let origin = p.to_vec();
    let step = dir.to_vec();
    let along = |t: f64| {
        let trial: Vec<f64> = origin.iter().zip(&step).map(|(o, d)| o + t * d).collect();
        objective(&trial)
    };

    let (a, b, c) = bracket_minimum(&along, 0.0, 1.0);
    let (xmin, fmin) = brent(&along, a, b, c, config.line_tol, config.line_max_iter);

    for (x, d) in p.iter_mut().zip(dir.iter_mut()) {
        *d *= xmin;
        *x += *d;
    }
    fmin
}

/// Downhill bracketing: returns `(a, b, c)` with `f(b) ≤ f(a)` and `f(b) ≤ f(c)`
/// when a bracket is found within the iteration cap.
fn bracket_minimum<F>(f: &F, a0: f64, b0: f64) -> (f64, f64, f64)
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = (a0, b0);
    let mut fa = f(a);
    let mut fb = f(b);
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = b + GOLD * (b - a);
    let mut fc = f(c);

    for _ in 0..BRACKET_MAX_ITER {
        if fb <= fc {
            break;
        }
        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let denom = 2.0 * (q - r).abs().max(TINY).copysign(q - r);
        let mut u = b - ((b - c) * q - (b - a) * r) / denom;
        let ulim = b + GLIMIT * (c - b);
        let mut fu;

        if (b - u) * (u - c) > 0.0 {
            fu = f(u);
            if fu < fc {
                return (b, u, c);
            } else if fu > fb {
                return (a, b, u);
            }
            u = c + GOLD * (c - b);
            fu = f(u);
        } else if (c - u) * (u - ulim) > 0.0 {
            fu = f(u);
            if fu < fc {
                b = c;
                c = u;
                u = c + GOLD * (c - b);
                fb = fc;
                fc = fu;
                fu = f(u);
            }
        } else if (u - ulim) * (ulim - c) >= 0.0 {
            u = ulim;
            fu = f(u);
        } else {
            u = c + GOLD * (c - b);
            fu = f(u);
        }

        a = b;
        b = c;
        c = u;
        fa = fb;
        fb = fc;
        fc = fu;
    }
    (a, b, c)
}

/// Brent's parabolic-interpolation line search on the bracket `(ax, bx, cx)`.
fn brent<F>(f: &F, ax: f64, bx: f64, cx: f64, tol: f64, max_iter: usize) -> (f64, f64)
where
    F: Fn(f64) -> f64,
{
    let mut a = ax.min(cx);
    let mut b = ax.max(cx);
    let (mut x, mut w, mut v) = (bx, bx, bx);
    let mut fx = f(x);
    let (mut fw, mut fv) = (fx, fx);
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for _ in 0..max_iter {
        let xm = 0.5 * (a + b);
        let tol1 = tol * x.abs() + ZEPS;
        let tol2 = 2.0 * tol1;
        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            break;
        }

        let golden_step = |x: f64| if x >= xm { a - x } else { b - x };
        if e.abs() > tol1 {
            // Trial parabolic fit through x, v, w
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let etemp = e;
            e = d;
            if p.abs() >= (0.5 * q * etemp).abs() || p <= q * (a - x) || p >= q * (b - x) {
                e = golden_step(x);
                d = CGOLD * e;
            } else {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
            }
        } else {
            e = golden_step(x);
            d = CGOLD * e;
        }

        let u = if d.abs() >= tol1 {
            x + d
        } else {
            x + tol1.copysign(d)
        };
        let fu = f(u);

        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }
    (x, fx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn brent_finds_parabola_vertex() {
        let f = |x: f64| (x - 2.0).powi(2) + 1.0;
        let (a, b, c) = bracket_minimum(&f, 0.0, 1.0);
        assert!(f(b) <= f(a) && f(b) <= f(c));
        let (x, fx) = brent(&f, a, b, c, 2e-8, 100);
        assert_abs_diff_eq!(x, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fx, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn bracket_handles_uphill_start() {
        let f = |x: f64| (x + 3.0).powi(2);
        let (a, b, c) = bracket_minimum(&f, 0.0, 1.0);
        assert!(f(b) <= f(a) && f(b) <= f(c));
        assert!(a.min(c) <= -3.0 && a.max(c) >= -3.0);
    }

    #[test]
    fn powell_minimizes_correlated_quadratic() {
        let f = |x: &[f64]| {
            let (u, v, w) = (x[0] - 1.0, x[1] + 2.0, x[2] - 0.5);
            u * u + 2.0 * v * v + 3.0 * w * w + u * v + 0.5 * v * w
        };
        let res = powell(f, &[0.0, 0.0, 0.0], &PowellConfig::default());
        assert!(res.converged);
        assert_abs_diff_eq!(res.x[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(res.x[1], -2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(res.x[2], 0.5, epsilon = 1e-5);
        assert!(res.fval < 1e-10);
    }

    #[test]
    fn powell_reports_iteration_cap() {
        let f = |x: &[f64]| {
            let (u, v) = (x[0] - 1.0, x[1] + 2.0);
            u * u + 10.0 * v * v + 6.0 * u * v + 5.0
        };
        let config = PowellConfig {
            max_iter: 1,
            ..PowellConfig::default()
        };
        let res = powell(f, &[10.0, 10.0], &config);
        assert!(!res.converged);
        assert_eq!(res.iterations, 1);
    }
}
