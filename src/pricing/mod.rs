//! Closed-form FX vanilla pricing.
//!
//! - [`GarmanKohlhagen`] — Black–Scholes with a foreign yield, plus Greeks
//!   and implied-volatility inversion
//! - [`Greeks`] — the full spot and dual sensitivity set

pub mod garman_kohlhagen;
pub mod greeks;

pub use garman_kohlhagen::{GarmanKohlhagen, ImpliedVolConfig};
pub use greeks::Greeks;
