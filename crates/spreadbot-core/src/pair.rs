//! Trading pair identifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A base/quote asset pair written as `BASE-QUOTE` (e.g. `BTC-USDT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    /// Build a pair from its two asset symbols.
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Base asset symbol (the asset being bought or sold).
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote asset symbol (the asset prices are denominated in).
    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((base, quote))
                if !base.is_empty() && !quote.is_empty() && !quote.contains('-') =>
            {
                Ok(Self::new(base, quote))
            }
            _ => Err(CoreError::InvalidPair(s.to_string())),
        }
    }
}

impl Serialize for TradingPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TradingPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
