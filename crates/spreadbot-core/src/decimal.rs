//! Precision-safe decimal types for quoting.
//!
//! Uses `rust_decimal` for exact decimal arithmetic. Every price, size and
//! balance in the strategy flows through these types; only the statistical
//! indicator math is allowed to touch `f64`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with sizes in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Quantize to `decimal_places`, ties to even.
    ///
    /// Matches the half-even quantization exchanges expect from a decimal
    /// price grid such as `0.01`.
    #[inline]
    pub fn round_to_precision(&self, decimal_places: u32) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven),
        )
    }

    /// Offset this price by a fractional spread below it: `self * (1 - spread)`.
    ///
    /// `None` on overflow.
    #[inline]
    pub fn below_by(&self, spread: Decimal) -> Option<Self> {
        let factor = Decimal::ONE.checked_sub(spread)?;
        self.0.checked_mul(factor).map(Self)
    }

    /// Offset this price by a fractional spread above it: `self * (1 + spread)`.
    ///
    /// `None` on overflow.
    #[inline]
    pub fn above_by(&self, spread: Decimal) -> Option<Self> {
        let factor = Decimal::ONE.checked_add(spread)?;
        self.0.checked_mul(factor).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

/// Order amount in base-asset units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Notional value in quote units: size * price. `None` on overflow.
    #[inline]
    pub fn notional(&self, price: Price) -> Option<Decimal> {
        self.0.checked_mul(price.0)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}
