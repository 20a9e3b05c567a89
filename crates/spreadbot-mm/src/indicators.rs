//! Volatility and trend indicators over the price window.
//!
//! **Volatility**: Bollinger relative band width,
//! `(upper - lower) / mean` with `upper/lower = mean ± k·σ` over the last
//! `bb_length` samples. σ is the sample standard deviation (n - 1).
//!
//! **Trend**: fast vs slow simple moving average with a relative dead band.
//!
//! Both degrade to fixed defaults when the window is too short, so callers
//! never see `DataInsufficient`.

use std::fmt;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::StrategyConfig;
use crate::price_window::PriceWindow;

/// Decimal places kept for indicator outputs.
pub const INDICATOR_DP: u32 = 4;

/// Directional signal from the moving average crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    /// Sideways, or not enough data to tell.
    #[default]
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Indicator values for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSnapshot {
    /// Relative band width, >= 0, 4 dp.
    pub volatility: Decimal,
    pub trend: Trend,
}

/// Computes indicators from a `PriceWindow`.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    bb_length: usize,
    bb_std: f64,
    volatility_fallback: Decimal,
    fast_period: usize,
    slow_period: usize,
    trend_threshold: f64,
}

impl IndicatorEngine {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            bb_length: config.bb_length,
            bb_std: config.bb_std,
            volatility_fallback: config.volatility_fallback,
            fast_period: config.fast_period,
            slow_period: config.slow_period,
            trend_threshold: config.trend_threshold,
        }
    }

    /// Compute both indicators.
    pub fn snapshot(&self, window: &PriceWindow) -> IndicatorSnapshot {
        IndicatorSnapshot {
            volatility: self.volatility(window),
            trend: self.trend(window),
        }
    }

    /// Bollinger relative band width of the last `bb_length` samples.
    ///
    /// Returns `volatility_fallback` when the window is shorter than
    /// `bb_length` or the band width is not finite (zero mean).
    pub fn volatility(&self, window: &PriceWindow) -> Decimal {
        let samples = match window.snapshot(self.bb_length) {
            Ok(samples) => samples,
            Err(_) => return self.volatility_fallback,
        };

        let mean = mean(&samples);
        let stdev = sample_stdev(&samples, mean);
        let upper = mean + stdev * self.bb_std;
        let lower = mean - stdev * self.bb_std;
        let bandwidth = (upper - lower) / mean;

        match Decimal::from_f64(bandwidth) {
            Some(vol) if bandwidth.is_finite() => vol.round_dp(INDICATOR_DP).max(Decimal::ZERO),
            _ => {
                warn!(
                    mean,
                    stdev, "Band width not representable, using fallback volatility"
                );
                self.volatility_fallback
            }
        }
    }

    /// Fast/slow moving average crossover.
    ///
    /// Up when the fast average is more than `trend_threshold` above the
    /// slow one, Down when more than `trend_threshold` below, Neutral
    /// otherwise and whenever the window is shorter than `slow_period`.
    pub fn trend(&self, window: &PriceWindow) -> Trend {
        let slow = match window.snapshot(self.slow_period) {
            Ok(samples) => samples,
            Err(_) => return Trend::Neutral,
        };
        let fast = &slow[slow.len() - self.fast_period.min(slow.len())..];

        let fast_ma = mean(fast);
        let slow_ma = mean(&slow);

        if fast_ma > slow_ma * (1.0 + self.trend_threshold) {
            Trend::Up
        } else if fast_ma < slow_ma * (1.0 - self.trend_threshold) {
            Trend::Down
        } else {
            Trend::Neutral
        }
    }
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn sample_stdev(samples: &[f64], mean: f64) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let ss: f64 = samples.iter().map(|x| (x - mean) * (x - mean)).sum();
    (ss / (n - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> IndicatorEngine {
        IndicatorEngine::new(&StrategyConfig::default())
    }

    fn window_from(prices: impl IntoIterator<Item = f64>) -> PriceWindow {
        let mut window = PriceWindow::new(100);
        for px in prices {
            window.push(px);
        }
        window
    }

    #[test]
    fn test_volatility_fallback_below_bb_length() {
        let engine = engine();
        for len in 0..20 {
            let window = window_from((0..len).map(|i| 80_000.0 + i as f64 * 100.0));
            assert_eq!(engine.volatility(&window), dec!(0.005), "len={len}");
        }
    }

    #[test]
    fn test_volatility_zero_for_flat_prices() {
        let engine = engine();
        // Noisy history followed by 20 identical samples
        let mut window = window_from((0..80).map(|i| 80_000.0 + (i % 7) as f64 * 37.0));
        for _ in 0..20 {
            window.push(80_000.0);
        }
        let vol = engine.volatility(&window);
        assert_eq!(vol, dec!(0.0000));
        assert!(vol.is_zero());
    }

    #[test]
    fn test_volatility_known_value() {
        // 10 samples alternating 99/101: mean 100, sample stdev = sqrt(10/9)
        // width = 4σ / 100 = 0.04216...
        let config = StrategyConfig {
            bb_length: 10,
            ..Default::default()
        };
        let engine = IndicatorEngine::new(&config);
        let window = window_from((0..10).map(|i| if i % 2 == 0 { 99.0 } else { 101.0 }));
        assert_eq!(engine.volatility(&window), dec!(0.0422));
    }

    #[test]
    fn test_volatility_uses_only_last_bb_length_samples() {
        let engine = engine();
        // Wild history, then a flat tail exactly bb_length long
        let mut window = window_from((0..50).map(|i| if i % 2 == 0 { 50_000.0 } else { 90_000.0 }));
        for _ in 0..20 {
            window.push(70_000.0);
        }
        assert!(engine.volatility(&window).is_zero());
    }

    #[test]
    fn test_volatility_zero_mean_falls_back() {
        let engine = engine();
        let window = window_from((0..20).map(|i| if i % 2 == 0 { -1.0 } else { 1.0 }));
        assert_eq!(engine.volatility(&window), dec!(0.005));
    }

    #[test]
    fn test_trend_neutral_below_slow_period() {
        let engine = engine();
        for len in [0usize, 1, 10, 49] {
            let window = window_from((0..len).map(|i| 100.0 + i as f64 * 10.0));
            assert_eq!(engine.trend(&window), Trend::Neutral, "len={len}");
        }
    }

    #[test]
    fn test_trend_up_for_increasing_prices() {
        let engine = engine();
        let window = window_from((0..60).map(|i| 100.0 + i as f64));
        assert_eq!(engine.trend(&window), Trend::Up);
    }

    #[test]
    fn test_trend_down_for_decreasing_prices() {
        let engine = engine();
        let window = window_from((0..60).map(|i| 200.0 - i as f64));
        assert_eq!(engine.trend(&window), Trend::Down);
    }

    #[test]
    fn test_trend_neutral_inside_dead_band() {
        let engine = engine();
        // Fast mean ~0.1% above slow: inside the 0.2% band
        let mut window = window_from(std::iter::repeat(100_000.0).take(40));
        for _ in 0..10 {
            window.push(100_125.0);
        }
        assert_eq!(engine.trend(&window), Trend::Neutral);
    }

    #[test]
    fn test_trend_neutral_for_flat_prices() {
        let engine = engine();
        let window = window_from(std::iter::repeat(80_000.0).take(100));
        assert_eq!(engine.trend(&window), Trend::Neutral);
    }

    #[test]
    fn test_snapshot_combines_both() {
        let engine = engine();
        let window = window_from((0..60).map(|i| 100.0 + i as f64));
        let snapshot = engine.snapshot(&window);
        assert_eq!(snapshot.trend, Trend::Up);
        assert!(snapshot.volatility > Decimal::ZERO);
    }

    #[test]
    fn test_trend_display() {
        assert_eq!(Trend::Up.to_string(), "up");
        assert_eq!(Trend::Down.to_string(), "down");
        assert_eq!(Trend::default(), Trend::Neutral);
    }
}
