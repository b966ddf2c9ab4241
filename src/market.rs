//! Market inputs: the rate/spot snapshot and the five-pillar delta smile.

use serde::{Deserialize, Serialize};

use crate::conventions;
use crate::error::{self, FxSmileError};
use crate::validate::{validate_finite, validate_positive};

/// Spot, deposit rates and expiry for one pricing context.
///
/// Rates are continuously compounded. The domestic currency is the pricing
/// currency; the foreign rate plays the role of a dividend yield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MarketSnapshotRaw", into = "MarketSnapshotRaw")]
pub struct MarketSnapshot {
    spot: f64,
    domestic_rate: f64,
    foreign_rate: f64,
    term: f64,
}

#[derive(Serialize, Deserialize)]
struct MarketSnapshotRaw {
    spot: f64,
    domestic_rate: f64,
    foreign_rate: f64,
    term: f64,
}

impl TryFrom<MarketSnapshotRaw> for MarketSnapshot {
    type Error = FxSmileError;
    fn try_from(raw: MarketSnapshotRaw) -> Result<Self, Self::Error> {
        Self::new(raw.spot, raw.domestic_rate, raw.foreign_rate, raw.term)
    }
}

impl From<MarketSnapshot> for MarketSnapshotRaw {
    fn from(m: MarketSnapshot) -> Self {
        Self {
            spot: m.spot,
            domestic_rate: m.domestic_rate,
            foreign_rate: m.foreign_rate,
            term: m.term,
        }
    }
}

impl MarketSnapshot {
    /// Create a snapshot.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] if spot or term is non-positive,
    /// or any value is not finite.
    pub fn new(spot: f64, domestic_rate: f64, foreign_rate: f64, term: f64) -> error::Result<Self> {
        validate_positive(spot, "spot")?;
        validate_finite(domestic_rate, "domestic rate")?;
        validate_finite(foreign_rate, "foreign rate")?;
        validate_positive(term, "term")?;
        Ok(Self {
            spot,
            domestic_rate,
            foreign_rate,
            term,
        })
    }

    pub fn spot(&self) -> f64 {
        self.spot
    }

    pub fn domestic_rate(&self) -> f64 {
        self.domestic_rate
    }

    pub fn foreign_rate(&self) -> f64 {
        self.foreign_rate
    }

    /// Expiry as a year fraction.
    pub fn term(&self) -> f64 {
        self.term
    }

    /// Outright forward `S·exp((r_d − r_f)·T)`.
    pub fn forward(&self) -> f64 {
        conventions::forward_price(self.spot, self.domestic_rate, self.foreign_rate, self.term)
    }

    /// Domestic discount factor `exp(−r_d·T)`.
    pub fn domestic_discount(&self) -> f64 {
        (-self.domestic_rate * self.term).exp()
    }

    /// Foreign discount factor `exp(−r_f·T)`.
    pub fn foreign_discount(&self) -> f64 {
        (-self.foreign_rate * self.term).exp()
    }
}

/// The five quoted delta pillars, in strike order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaPillar {
    Put10,
    Put25,
    Atm,
    Call25,
    Call10,
}

impl DeltaPillar {
    /// All pillars in strike order.
    pub const ALL: [DeltaPillar; 5] = [
        DeltaPillar::Put10,
        DeltaPillar::Put25,
        DeltaPillar::Atm,
        DeltaPillar::Call25,
        DeltaPillar::Call10,
    ];

    /// Position of the pillar in a [`VolatilitySmile`].
    pub fn index(self) -> usize {
        match self {
            DeltaPillar::Put10 => 0,
            DeltaPillar::Put25 => 1,
            DeltaPillar::Atm => 2,
            DeltaPillar::Call25 => 3,
            DeltaPillar::Call10 => 4,
        }
    }
}

/// Quoted implied vols at the five delta pillars (10P, 25P, ATM, 25C, 10C).
///
/// Equality is value equality; surfaces use it to decide whether a new smile
/// requires recalibration.
///
/// ```
/// use fxsmile::market::{DeltaPillar, VolatilitySmile};
///
/// let smile = VolatilitySmile::new([0.117885, 0.1191, 0.1300, 0.1501, 0.174995])?;
/// assert_eq!(smile.vol(DeltaPillar::Atm), 0.13);
/// assert!((smile.risk_reversal_25() - 0.031).abs() < 1e-12);
/// # Ok::<(), fxsmile::FxSmileError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 5]", into = "[f64; 5]")]
pub struct VolatilitySmile {
    vols: [f64; 5],
}

impl TryFrom<[f64; 5]> for VolatilitySmile {
    type Error = FxSmileError;
    fn try_from(vols: [f64; 5]) -> Result<Self, Self::Error> {
        Self::new(vols)
    }
}

impl From<VolatilitySmile> for [f64; 5] {
    fn from(s: VolatilitySmile) -> Self {
        s.vols
    }
}

impl VolatilitySmile {
    /// Create a smile from five pillar vols ordered 10P, 25P, ATM, 25C, 10C.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] if any vol is non-positive or not finite.
    pub fn new(vols: [f64; 5]) -> error::Result<Self> {
        for (pillar, &v) in DeltaPillar::ALL.iter().zip(vols.iter()) {
            validate_positive(v, &format!("{pillar:?} vol"))?;
        }
        Ok(Self { vols })
    }

    /// Create a smile from a slice, which must hold exactly five vols.
    ///
    /// # Errors
    /// Returns [`FxSmileError::InvalidInput`] for a wrong length or invalid vols.
    pub fn from_slice(vols: &[f64]) -> error::Result<Self> {
        let arr: [f64; 5] = vols.try_into().map_err(|_| FxSmileError::InvalidInput {
            message: format!("a smile needs exactly 5 pillar vols, got {}", vols.len()),
        })?;
        Self::new(arr)
    }

    /// Vol quoted at the given pillar.
    pub fn vol(&self, pillar: DeltaPillar) -> f64 {
        self.vols[pillar.index()]
    }

    /// The five vols in pillar order.
    pub fn vols(&self) -> &[f64; 5] {
        &self.vols
    }

    /// 25-delta risk reversal `σ(25C) − σ(25P)`.
    pub fn risk_reversal_25(&self) -> f64 {
        self.vols[3] - self.vols[1]
    }
}
