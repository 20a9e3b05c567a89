//! Strategy configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spreadbot_core::{CoreError, Size, TradingPair};

use crate::indicators::INDICATOR_DP;

/// Market making configuration.
///
/// Fixed at construction; the engine never reconfigures itself at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Pair to quote (e.g. "BTC-USDT").
    #[serde(default = "default_pair")]
    pub pair: TradingPair,

    /// Amount per order in base units.
    #[serde(default = "default_order_amount")]
    pub order_amount: Size,

    /// Spread before volatility, trend and inventory adjustments.
    #[serde(default = "default_base_spread")]
    pub base_spread: Decimal,

    /// Lower clamp for both spreads.
    #[serde(default = "default_min_spread")]
    pub min_spread: Decimal,

    /// Upper clamp for both spreads.
    #[serde(default = "default_max_spread")]
    pub max_spread: Decimal,

    /// Minimum time between refresh cycles in milliseconds.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    // --- Volatility (Bollinger band width) ---
    /// Bollinger band period (samples).
    #[serde(default = "default_bb_length")]
    pub bb_length: usize,

    /// Band half-width in standard deviations.
    #[serde(default = "default_bb_std")]
    pub bb_std: f64,

    /// Volatility reported while the window is shorter than `bb_length`.
    #[serde(default = "default_volatility_fallback")]
    pub volatility_fallback: Decimal,

    // --- Trend (moving average crossover) ---
    /// Fast moving average period (samples).
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,

    /// Slow moving average period (samples).
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,

    /// Relative margin the fast average must clear to call a trend.
    /// E.g. 0.002 = fast must be 0.2% above/below slow.
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold: f64,

    /// Spread multiplier on the with-trend side (bid in an uptrend).
    #[serde(default = "default_trend_tighten_factor")]
    pub trend_tighten_factor: Decimal,

    /// Spread multiplier on the against-trend side (ask in an uptrend).
    #[serde(default = "default_trend_widen_factor")]
    pub trend_widen_factor: Decimal,

    // --- Inventory ---
    /// Target share of portfolio value held in the base asset (0.0 – 1.0).
    #[serde(default = "default_target_base_pct")]
    pub target_base_pct: Decimal,

    /// Deviation from target that maps to full skew (|skew| = 1).
    #[serde(default = "default_max_skew")]
    pub max_skew: Decimal,

    // --- Price window ---
    /// Rolling window capacity (samples).
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Seed the window with a synthetic walk so indicators are defined from
    /// the first tick. Development convenience: the walk is not market data.
    #[serde(default = "default_true")]
    pub seed_window: bool,

    /// Centre of the synthetic seed walk.
    #[serde(default = "default_seed_base_price")]
    pub seed_base_price: f64,

    /// RNG seed for a reproducible seed walk. `None` = OS entropy.
    #[serde(default)]
    pub seed_rng_seed: Option<u64>,

    // --- Execution ---
    /// Decimal places of the quote asset's price grid.
    #[serde(default = "default_price_precision")]
    pub price_precision: u32,

    /// Timeout for each cancel/submit call in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Log routine skips (e.g. connector not ready) at info instead of debug.
    #[serde(default = "default_true")]
    pub verbose: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            pair: default_pair(),
            order_amount: default_order_amount(),
            base_spread: default_base_spread(),
            min_spread: default_min_spread(),
            max_spread: default_max_spread(),
            refresh_interval_ms: default_refresh_interval_ms(),
            bb_length: default_bb_length(),
            bb_std: default_bb_std(),
            volatility_fallback: default_volatility_fallback(),
            fast_period: default_fast_period(),
            slow_period: default_slow_period(),
            trend_threshold: default_trend_threshold(),
            trend_tighten_factor: default_trend_tighten_factor(),
            trend_widen_factor: default_trend_widen_factor(),
            target_base_pct: default_target_base_pct(),
            max_skew: default_max_skew(),
            window_capacity: default_window_capacity(),
            seed_window: true,
            seed_base_price: default_seed_base_price(),
            seed_rng_seed: None,
            price_precision: default_price_precision(),
            call_timeout_ms: default_call_timeout_ms(),
            verbose: true,
        }
    }
}

impl StrategyConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: String| Err(CoreError::InvalidConfig(msg));

        if !self.order_amount.is_positive() {
            return invalid(format!(
                "order_amount must be positive, got {}",
                self.order_amount
            ));
        }
        if self.min_spread.is_sign_negative() || self.min_spread > self.max_spread {
            return invalid(format!(
                "spread bounds must satisfy 0 <= min_spread <= max_spread, got [{}, {}]",
                self.min_spread, self.max_spread
            ));
        }
        if self.min_spread.scale() > INDICATOR_DP || self.max_spread.scale() > INDICATOR_DP {
            return invalid(format!(
                "spread bounds must have at most {INDICATOR_DP} decimal places, got [{}, {}]",
                self.min_spread, self.max_spread
            ));
        }
        if self.base_spread.is_sign_negative() {
            return invalid(format!(
                "base_spread must be non-negative, got {}",
                self.base_spread
            ));
        }
        if self.refresh_interval_ms == 0 {
            return invalid("refresh_interval_ms must be positive".to_string());
        }
        if self.bb_length < 2 {
            return invalid(format!("bb_length must be at least 2, got {}", self.bb_length));
        }
        if !self.bb_std.is_finite() || self.bb_std < 0.0 {
            return invalid(format!("bb_std must be finite and >= 0, got {}", self.bb_std));
        }
        if self.fast_period == 0 || self.fast_period >= self.slow_period {
            return invalid(format!(
                "trend periods must satisfy 0 < fast_period < slow_period, got {} / {}",
                self.fast_period, self.slow_period
            ));
        }
        if !self.trend_threshold.is_finite() || self.trend_threshold < 0.0 {
            return invalid(format!(
                "trend_threshold must be finite and >= 0, got {}",
                self.trend_threshold
            ));
        }
        if self.target_base_pct < Decimal::ZERO || self.target_base_pct > Decimal::ONE {
            return invalid(format!(
                "target_base_pct must be within [0, 1], got {}",
                self.target_base_pct
            ));
        }
        if self.max_skew <= Decimal::ZERO {
            return invalid(format!("max_skew must be positive, got {}", self.max_skew));
        }
        if self.window_capacity < self.slow_period || self.window_capacity < self.bb_length {
            return invalid(format!(
                "window_capacity {} cannot hold slow_period {} / bb_length {}",
                self.window_capacity, self.slow_period, self.bb_length
            ));
        }
        if self.seed_window && !(self.seed_base_price.is_finite() && self.seed_base_price > 0.0)
        {
            return invalid(format!(
                "seed_base_price must be positive, got {}",
                self.seed_base_price
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
fn default_pair() -> TradingPair {
    TradingPair::new("BTC", "USDT")
}
fn default_order_amount() -> Size {
    Size::new(Decimal::new(1, 2)) // 0.01 base
}
fn default_base_spread() -> Decimal {
    Decimal::new(5, 4) // 0.0005 = 5 bps
}
fn default_min_spread() -> Decimal {
    Decimal::new(1, 4) // 0.0001 = 1 bps
}
fn default_max_spread() -> Decimal {
    Decimal::new(1, 2) // 0.01 = 100 bps
}
fn default_refresh_interval_ms() -> u64 {
    150_000 // 150 seconds
}
fn default_bb_length() -> usize {
    20
}
fn default_bb_std() -> f64 {
    2.0
}
fn default_volatility_fallback() -> Decimal {
    Decimal::new(5, 3) // 0.005
}
fn default_fast_period() -> usize {
    10
}
fn default_slow_period() -> usize {
    50
}
fn default_trend_threshold() -> f64 {
    0.002 // 0.2%
}
fn default_trend_tighten_factor() -> Decimal {
    Decimal::new(8, 1) // 0.8
}
fn default_trend_widen_factor() -> Decimal {
    Decimal::new(12, 1) // 1.2
}
fn default_target_base_pct() -> Decimal {
    Decimal::new(5, 1) // 50% of value in base
}
fn default_max_skew() -> Decimal {
    Decimal::new(5, 1) // 0.5
}
fn default_window_capacity() -> usize {
    100
}
fn default_seed_base_price() -> f64 {
    80_000.0
}
fn default_price_precision() -> u32 {
    2
}
fn default_call_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config() {
        let config = StrategyConfig::default();
        assert_eq!(config.pair.to_string(), "BTC-USDT");
        assert_eq!(config.order_amount.inner(), dec!(0.01));
        assert_eq!(config.base_spread, dec!(0.0005));
        assert_eq!(config.min_spread, dec!(0.0001));
        assert_eq!(config.max_spread, dec!(0.01));
        assert_eq!(config.refresh_interval_ms, 150_000);
        assert_eq!(config.bb_length, 20);
        assert!((config.bb_std - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.volatility_fallback, dec!(0.005));
        assert_eq!(config.fast_period, 10);
        assert_eq!(config.slow_period, 50);
        assert!((config.trend_threshold - 0.002).abs() < f64::EPSILON);
        assert_eq!(config.trend_tighten_factor, dec!(0.8));
        assert_eq!(config.trend_widen_factor, dec!(1.2));
        assert_eq!(config.target_base_pct, dec!(0.5));
        assert_eq!(config.max_skew, dec!(0.5));
        assert_eq!(config.window_capacity, 100);
        assert!(config.seed_window);
        assert!(config.seed_rng_seed.is_none());
        assert_eq!(config.price_precision, 2);
        assert_eq!(config.call_timeout_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serde_defaults() {
        let toml_str = r#"
pair = "ETH-USDC"
order_amount = "0.5"
max_spread = "0.02"
seed_rng_seed = 7
"#;
        let config: StrategyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pair.base(), "ETH");
        assert_eq!(config.order_amount.inner(), dec!(0.5));
        assert_eq!(config.max_spread, dec!(0.02));
        assert_eq!(config.min_spread, dec!(0.0001));
        assert_eq!(config.seed_rng_seed, Some(7));
        assert_eq!(config.slow_period, 50);
    }

    #[test]
    fn test_validate_rejects_inverted_spreads() {
        let config = StrategyConfig {
            min_spread: dec!(0.02),
            max_spread: dec!(0.01),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_periods() {
        let config = StrategyConfig {
            fast_period: 50,
            slow_period: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            bb_length: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_skew() {
        let config = StrategyConfig {
            max_skew: Decimal::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_small_window() {
        let config = StrategyConfig {
            window_capacity: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_amount_and_bad_target() {
        let config = StrategyConfig {
            order_amount: Size::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            target_base_pct: dec!(1.5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_spread_bounds_finer_than_signal_precision() {
        // Spreads are rounded to 4 dp after clamping; finer bounds could be rounded past
        let config = StrategyConfig {
            min_spread: dec!(0.00005),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            max_spread: dec!(0.012345),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Trailing zeros within 4 dp are fine
        let config = StrategyConfig {
            min_spread: dec!(0.0001),
            max_spread: dec!(0.0100),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
