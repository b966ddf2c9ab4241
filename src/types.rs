//! Core domain types.
//!
//! These newtypes wrap `f64` to provide compile-time type safety on outputs,
//! preventing accidental mixing of a volatility with a strike or a variance.
//!
//! # Newtype Strategy
//!
//! **Outputs use newtypes**: [`Vol`], [`Variance`], [`Strike`] wrap return values.
//!
//! **Inputs use bare `f64`**: methods like `volatility(strike: f64)` accept raw
//! floats; parameter names document them and validation happens inside.
//!
//! These types wrap `f64`, which does not implement `Eq` or `Ord` because `NaN`
//! breaks total ordering. Only `PartialEq` and `PartialOrd` are derived.

use serde::{Deserialize, Serialize};

/// Strike price `K` of an option contract, in domestic units per foreign unit.
///
/// # Examples
/// ```
/// use fxsmile::types::Strike;
/// let strike = Strike(1.10);
/// assert_eq!(strike.0, 1.10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Strike(pub f64);

/// Implied volatility `σ`, measured as annualized standard deviation.
///
/// A vol of 0.10 represents 10% annualized volatility.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Vol(pub f64);

/// Total variance `σ²T`.
///
/// # Examples
/// ```
/// use fxsmile::types::Variance;
/// let var = Variance(0.01); // 10% vol over one year
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Variance(pub f64);

/// Option type: call or put on the foreign currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    /// Right to buy the foreign currency at the strike.
    Call,
    /// Right to sell the foreign currency at the strike.
    Put,
}

impl OptionType {
    /// Payoff sign ω: `+1` for calls, `-1` for puts.
    ///
    /// ```
    /// use fxsmile::OptionType;
    /// assert_eq!(OptionType::Call.sign(), 1.0);
    /// assert_eq!(OptionType::Put.sign(), -1.0);
    /// ```
    pub fn sign(self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }
}
