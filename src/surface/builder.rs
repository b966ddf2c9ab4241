//! Builder for the surfaces of one currency pair across several tenors.
//!
//! ```
//! use fxsmile::surface::{SmileModel, SurfaceBuilder};
//!
//! let smile = [0.1030, 0.0990, 0.1000, 0.1060, 0.1150];
//!
//! let surfaces = SurfaceBuilder::new()
//!     .spot(1.10)
//!     .domestic_rate(0.05)
//!     .foreign_rate(0.03)
//!     .model(SmileModel::SabrWithWings)
//!     .add_tenor(1.0, &smile)
//!     .add_tenor(0.5, &smile)
//!     .build()?;
//!
//! assert_eq!(surfaces.len(), 2);
//! assert!(surfaces[0].market().term() < surfaces[1].market().term());
//! # Ok::<(), fxsmile::FxSmileError>(())
//! ```

use crate::error::{self, FxSmileError};
use crate::market::{MarketSnapshot, VolatilitySmile};
use crate::pricing::ImpliedVolConfig;
use crate::smile::SabrCalibrationConfig;
use crate::surface::{FxVolSurface, SmileModel, SurfaceConfig};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Accumulates spot, deposit rates and per-tenor quotes, then fits one
/// [`FxVolSurface`] per tenor.
///
/// Tenors are independent; with the `parallel` feature they are fitted on
/// the rayon pool.
#[derive(Debug)]
pub struct SurfaceBuilder {
    spot: Option<f64>,
    domestic_rate: Option<f64>,
    foreign_rate: Option<f64>,
    config: SurfaceConfig,
    tenors: Vec<TenorQuotes>,
}

#[derive(Debug)]
struct TenorQuotes {
    term: f64,
    vols: Vec<f64>,
}

impl SurfaceBuilder {
    /// Create a builder with [`SurfaceConfig::default`] settings.
    pub fn new() -> Self {
        Self {
            spot: None,
            domestic_rate: None,
            foreign_rate: None,
            config: SurfaceConfig::default(),
            tenors: Vec::new(),
        }
    }

    pub fn spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    /// Continuously compounded rate of the pricing currency.
    pub fn domestic_rate(mut self, rate: f64) -> Self {
        self.domestic_rate = Some(rate);
        self
    }

    /// Continuously compounded rate of the base currency.
    pub fn foreign_rate(mut self, rate: f64) -> Self {
        self.foreign_rate = Some(rate);
        self
    }

    /// Default is [`SmileModel::SabrWithWings`].
    pub fn model(mut self, model: SmileModel) -> Self {
        self.config.model = model;
        self
    }

    /// SABR CEV exponent. Default is 0.85.
    pub fn beta(mut self, beta: f64) -> Self {
        self.config.beta = beta;
        self
    }

    pub fn calibration_config(mut self, config: SabrCalibrationConfig) -> Self {
        self.config.calibration = config;
        self
    }

    pub fn implied_vol_config(mut self, config: ImpliedVolConfig) -> Self {
        self.config.implied_vol = config;
        self
    }

    /// Add the five pillar vols (10P, 25P, ATM, 25C, 10C) quoted for `term`.
    pub fn add_tenor(mut self, term: f64, vols: &[f64]) -> Self {
        self.tenors.push(TenorQuotes {
            term,
            vols: vols.to_vec(),
        });
        self
    }

    /// Fit every tenor and return the surfaces sorted by term.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] if spot or a rate is missing, no
    /// tenor was added, or any tenor's data is invalid. Fails with the first
    /// tenor error otherwise; there are no partial results.
    pub fn build(self) -> error::Result<Vec<FxVolSurface>> {
        #[cfg(feature = "logging")]
        tracing::debug!(
            n_tenors = self.tenors.len(),
            model = ?self.config.model,
            "surface build started"
        );

        let spot = self.spot.ok_or_else(|| FxSmileError::InvalidInput {
            message: "spot is required".into(),
        })?;
        let domestic_rate = self.domestic_rate.ok_or_else(|| FxSmileError::InvalidInput {
            message: "domestic rate is required".into(),
        })?;
        let foreign_rate = self.foreign_rate.ok_or_else(|| FxSmileError::InvalidInput {
            message: "foreign rate is required".into(),
        })?;
        if self.tenors.is_empty() {
            return Err(FxSmileError::InvalidInput {
                message: "at least one tenor is required".into(),
            });
        }

        let config = self.config;
        let fit_tenor = |tenor: &TenorQuotes| -> error::Result<FxVolSurface> {
            let market = MarketSnapshot::new(spot, domestic_rate, foreign_rate, tenor.term)?;
            let quotes = VolatilitySmile::from_slice(&tenor.vols)?;
            FxVolSurface::new(market, quotes, config)
        };

        #[cfg(feature = "parallel")]
        let mut surfaces: Vec<FxVolSurface> = self
            .tenors
            .par_iter()
            .map(fit_tenor)
            .collect::<error::Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let mut surfaces: Vec<FxVolSurface> = self.tenors.iter().map(fit_tenor).collect::<error::Result<Vec<_>>>()?;

        surfaces.sort_by(|a, b| a.market().term().total_cmp(&b.market().term()));

        #[cfg(feature = "logging")]
        tracing::debug!(n_tenors = surfaces.len(), "surface build complete");

        Ok(surfaces)
    }
}

impl Default for SurfaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
