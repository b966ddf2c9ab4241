//! Option sensitivities returned by the pricer and the surface.

use serde::{Deserialize, Serialize};

/// Full Garman–Kohlhagen sensitivity set for one vanilla option.
///
/// Spot Greeks are with respect to the spot rate, dual Greeks with respect
/// to the strike. Theta is per year (calendar decay is `theta / 365`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// ∂V/∂S
    pub delta: f64,
    /// ∂²V/∂S²
    pub gamma: f64,
    /// ∂V/∂σ
    pub vega: f64,
    /// ∂V/∂t
    pub theta: f64,
    /// ∂²V/∂S∂σ
    pub vanna: f64,
    /// ∂²V/∂σ²
    pub volga: f64,
    /// ∂V/∂K
    pub dual_delta: f64,
    /// ∂²V/∂K²
    pub dual_gamma: f64,
    /// ∂²V/∂K∂σ
    pub dual_vega: f64,
}
