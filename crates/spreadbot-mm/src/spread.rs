//! Bid/ask spread shaping.
//!
//! Each side goes through the same fixed pipeline:
//!
//! ```text
//! base_spread × (1 + vol) → × trend factor → × inventory factor → clamp → round(4)
//! ```
//!
//! Trend factor: Up tightens the bid and widens the ask (lean into strength),
//! Down mirrors it. Inventory factor: bid × (1 + skew), ask × (1 - skew), so a
//! base-overweight book quotes a wider bid and a tighter ask.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::indicators::{IndicatorSnapshot, Trend, INDICATOR_DP};

/// Spreads for one refresh, as fractions of mid price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadPair {
    pub bid_spread: Decimal,
    pub ask_spread: Decimal,
}

/// Combines indicator and inventory signals into spreads.
#[derive(Debug, Clone)]
pub struct SpreadCalculator {
    base_spread: Decimal,
    min_spread: Decimal,
    max_spread: Decimal,
    tighten_factor: Decimal,
    widen_factor: Decimal,
}

impl SpreadCalculator {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            base_spread: config.base_spread,
            min_spread: config.min_spread,
            max_spread: config.max_spread,
            tighten_factor: config.trend_tighten_factor,
            widen_factor: config.trend_widen_factor,
        }
    }

    /// Both spreads for the given signals.
    pub fn spreads(&self, indicators: &IndicatorSnapshot, skew: Decimal) -> SpreadPair {
        SpreadPair {
            bid_spread: self.bid_spread(indicators.volatility, indicators.trend, skew),
            ask_spread: self.ask_spread(indicators.volatility, indicators.trend, skew),
        }
    }

    pub fn bid_spread(&self, volatility: Decimal, trend: Trend, skew: Decimal) -> Decimal {
        let trend_factor = match trend {
            Trend::Up => Some(self.tighten_factor),
            Trend::Down => Some(self.widen_factor),
            Trend::Neutral => None,
        };
        self.shape(volatility, trend_factor, Decimal::ONE + skew)
    }

    pub fn ask_spread(&self, volatility: Decimal, trend: Trend, skew: Decimal) -> Decimal {
        let trend_factor = match trend {
            Trend::Up => Some(self.widen_factor),
            Trend::Down => Some(self.tighten_factor),
            Trend::Neutral => None,
        };
        self.shape(volatility, trend_factor, Decimal::ONE - skew)
    }

    fn shape(
        &self,
        volatility: Decimal,
        trend_factor: Option<Decimal>,
        inventory_factor: Decimal,
    ) -> Decimal {
        // Saturating: an out-of-range product lands on max_spread after the clamp
        let mut spread = self
            .base_spread
            .saturating_mul(Decimal::ONE.saturating_add(volatility));
        if let Some(factor) = trend_factor {
            spread = spread.saturating_mul(factor);
        }
        spread = spread.saturating_mul(inventory_factor);

        spread
            .max(self.min_spread)
            .min(self.max_spread)
            .round_dp(INDICATOR_DP)
    }
}
