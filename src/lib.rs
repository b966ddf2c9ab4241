//! # fxsmile
//!
//! FX vanilla smile construction from five delta-quoted vols.
//!
//! The pipeline: market snapshot and 10P/25P/ATM/25C/10C quotes → pillar
//! strikes by delta inversion → SABR calibration (heuristic first guess,
//! bounded direction-set refinement) → analytic price tails beyond the
//! 25-delta strikes → vol, premium and Greeks at any strike.
//!
//! ## Architecture
//!
//! - **`pricing`** — Garman–Kohlhagen premium, Greeks and implied vol
//! - **`delta`** — strikes from spot deltas, the five pillar strikes
//! - **`smile`** — SABR, its calibration, the winged and interpolated smiles
//! - **`surface`** — the public [`FxVolSurface`] and multi-tenor builder
//! - **`math`** — normal distribution, bisection, reparameterization, interpolation
//!
//! ## Design
//!
//! - **Newtypes for outputs, bare `f64` for inputs.** [`Vol`], [`Variance`]
//!   and [`Strike`] wrap return values; inputs are validated where they enter.
//! - **No panics.** Every fallible operation returns [`Result`]. Library code
//!   never calls `unwrap()` or `expect()`.
//! - **Composition over inheritance.** A surface owns a pricer-independent
//!   smile chosen by [`SmileModel`](surface::SmileModel); the wing smile
//!   wraps its SABR core.
//! - **Serializable.** Market data, parameters and configs implement Serde
//!   `Serialize` / `Deserialize`, validating on deserialization.
//!
//! ```
//! use fxsmile::{OptionType, build_surface};
//!
//! let surface = build_surface(
//!     1.10, 0.05, 0.03, 0.5,
//!     &[0.1030, 0.0990, 0.1000, 0.1060, 0.1150],
//!     0.85,
//! )?;
//! let k = 1.0;
//! let vol = surface.volatility(k)?;
//! let put = surface.price(k, OptionType::Put)?;
//! assert!(vol.0 > 0.0 && put > 0.0);
//! # Ok::<(), fxsmile::FxSmileError>(())
//! ```

pub mod conventions;
pub mod delta;
pub mod error;
pub mod market;
pub mod math;
mod optim;
pub mod pricing;
pub mod smile;
pub mod surface;
pub mod types;
mod validate;

#[doc(inline)]
pub use error::{FxSmileError, Result};
#[doc(inline)]
pub use market::{MarketSnapshot, VolatilitySmile};
#[doc(inline)]
pub use smile::SmileSection;
#[doc(inline)]
pub use surface::{FxVolSurface, build_surface};
#[doc(inline)]
pub use types::{OptionType, Strike, Variance, Vol};
