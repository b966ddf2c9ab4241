//! Error types for the fxsmile library.
//!
//! All fallible operations return `Result<T, FxSmileError>` rather than panicking.
//! Formula-level guards (for example `d1 = 0` for degenerate inputs) are defined
//! behaviour and never surface here.

use thiserror::Error;

/// Convenience type alias for results in this crate.
pub type Result<T> = std::result::Result<T, FxSmileError>;

/// Errors that can occur while pricing, calibrating or querying a smile.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FxSmileError {
    /// Input data is invalid (non-positive spot, strike, vol or term; NaN; wrong smile size).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Argument lies outside the mathematical domain of the operation
    /// (delta inversion with `z >= 1`, vol above 200%, probability outside \[0, 1\]).
    #[error("domain error: {message}")]
    DomainError { message: String },

    /// A bracketing root finder was handed an interval without a sign change.
    #[error("no root in interval [{lower}, {upper}]")]
    NoRootInInterval { lower: f64, upper: f64 },

    /// Smile calibration did not converge.
    #[error("calibration diverged: {message}")]
    CalibrationDivergence {
        message: String,
        /// Model that failed (e.g., "SABR").
        model: &'static str,
        /// Weighted RMS vol error at the last iterate, if available.
        rms_error: Option<f64>,
    },

    /// Numerical computation failed (singular system, non-finite intermediate).
    #[error("numerical error: {message}")]
    NumericalError { message: String },
}
