//! Numerical building blocks: normal distribution, root finding,
//! reparameterization and 1-D interpolation.

pub mod interp;
pub mod normal;
pub mod solver;

pub use interp::{Interpolation, Interpolator};
pub use solver::{BisectionConfig, IntervalMap, bisection};
