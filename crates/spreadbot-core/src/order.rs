//! Order-related types and identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Price, Size};

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Exchange-assigned order identifier.
///
/// Opaque to the strategy: whatever the connector returns from a submit
/// call is stored and shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resting limit order placed by the strategy.
///
/// Records are never edited after creation; a refresh cycle replaces the
/// whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Identifier returned by the exchange.
    pub id: OrderId,
    /// Buy (bid) or sell (ask).
    pub side: OrderSide,
    /// Limit price, already quantized to the instrument precision.
    pub price: Price,
    /// Order amount in base units.
    pub amount: Size,
    /// Tick timestamp (Unix milliseconds) of the refresh that placed it.
    pub placed_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_display() {
        assert_eq!(OrderSide::Buy.to_string(), "buy");
        assert_eq!(OrderSide::Sell.to_string(), "sell");
    }

    #[test]
    fn test_order_id_display() {
        let id = OrderId::new("buy-BTC-USDT-1");
        assert_eq!(id.as_str(), "buy-BTC-USDT-1");
        assert_eq!(format!("{id}"), "buy-BTC-USDT-1");
    }

    #[test]
    fn test_record_equality() {
        let record = OrderRecord {
            id: OrderId::new("1"),
            side: OrderSide::Buy,
            price: Price::new(dec!(79960)),
            amount: Size::new(dec!(0.01)),
            placed_at_ms: 150_000,
        };
        assert_eq!(record.clone(), record);
    }
}
