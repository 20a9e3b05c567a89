//! Tick-driven strategy engine.
//!
//! Owns the price window, the signal components and the quote refresher for
//! one pair. The host calls `on_tick` on its own cadence; everything except
//! the cancel/place sequence happens synchronously inside the call.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use spreadbot_core::{CoreError, OrderRecord, Price};
use tracing::{debug, error, info, warn};

use crate::config::StrategyConfig;
use crate::connector::DynConnector;
use crate::error::StrategyError;
use crate::indicators::{IndicatorEngine, IndicatorSnapshot};
use crate::inventory::InventoryModel;
use crate::price_window::PriceWindow;
use crate::refresher::{QuoteRefresher, RefreshReport, RefreshState};
use crate::spread::{SpreadCalculator, SpreadPair};

/// Why a due tick did not start a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ConnectorNotReady,
    NoMidPrice,
    InsufficientBalance,
    /// Previous cycle still outstanding.
    RefreshInFlight,
    /// No async runtime to run the cycle on.
    NoRuntime,
    /// Quote prices or notional fell outside the decimal range.
    Overflow,
}

impl SkipReason {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectorNotReady => "connector_not_ready",
            Self::NoMidPrice => "no_mid_price",
            Self::InsufficientBalance => "insufficient_balance",
            Self::RefreshInFlight => "refresh_in_flight",
            Self::NoRuntime => "no_runtime",
            Self::Overflow => "arithmetic_overflow",
        }
    }
}

/// Signals computed on a due tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSignals {
    pub mid_price: Price,
    pub indicators: IndicatorSnapshot,
    pub skew: Decimal,
    pub spreads: SpreadPair,
}

/// What `on_tick` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Refresh interval has not elapsed.
    NotDue,
    /// Interval elapsed but the cycle was skipped. Signals are present when
    /// they were computed before the skip.
    Skipped {
        reason: SkipReason,
        signals: Option<TickSignals>,
    },
    /// A refresh cycle was started with these signals.
    RefreshStarted(TickSignals),
}

/// Single-pair market making engine.
pub struct StrategyEngine {
    config: StrategyConfig,
    connector: DynConnector,
    window: PriceWindow,
    indicators: IndicatorEngine,
    inventory: InventoryModel,
    spreads: SpreadCalculator,
    refresher: QuoteRefresher,
    /// Reports of cycles that finished since the last `take_reports`.
    completed: Vec<RefreshReport>,
}

impl StrategyEngine {
    /// Build an engine, seeding the price window if configured.
    pub fn new(config: StrategyConfig, connector: DynConnector) -> Result<Self, CoreError> {
        config.validate()?;

        let window = if config.seed_window {
            let mut rng = match config.seed_rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            info!(
                base = config.seed_base_price,
                samples = config.window_capacity,
                "Seeding price window with synthetic walk (not market data)"
            );
            PriceWindow::seeded(config.seed_base_price, config.window_capacity, &mut rng)
        } else {
            PriceWindow::new(config.window_capacity)
        };

        Ok(Self::with_window(config, connector, window))
    }

    /// Build an engine around an existing window.
    pub fn with_window(
        config: StrategyConfig,
        connector: DynConnector,
        window: PriceWindow,
    ) -> Self {
        let refresher = QuoteRefresher::new(&config, connector.clone());
        Self {
            indicators: IndicatorEngine::new(&config),
            inventory: InventoryModel::new(&config),
            spreads: SpreadCalculator::new(&config),
            refresher,
            window,
            connector,
            config,
            completed: Vec::new(),
        }
    }

    /// Process one scheduler tick at `now_ms` (Unix milliseconds).
    ///
    /// Never fails: every collaborator problem is logged and reported as a
    /// `TickOutcome`. A started refresh runs in the background; its result
    /// is applied on a later tick.
    pub fn on_tick(&mut self, now_ms: u64) -> TickOutcome {
        if let Some(report) = self.refresher.poll_completion() {
            self.completed.push(report);
        }

        if !self.refresher.is_due(now_ms) {
            return TickOutcome::NotDue;
        }

        if self.refresher.is_busy() {
            debug!(pair = %self.config.pair, state = ?self.refresher.state(), "Previous refresh still in flight");
            return TickOutcome::Skipped {
                reason: SkipReason::RefreshInFlight,
                signals: None,
            };
        }

        self.refresher.mark_refreshed(now_ms);

        if !self.connector.is_ready() {
            if self.config.verbose {
                info!(pair = %self.config.pair, "Connector not ready");
            } else {
                debug!(pair = %self.config.pair, "Connector not ready");
            }
            return TickOutcome::Skipped {
                reason: SkipReason::ConnectorNotReady,
                signals: None,
            };
        }

        let mid_price = match self.mid_price() {
            Ok(mid) => mid,
            Err(err) => {
                warn!(error = %err, "Skipping tick");
                return TickOutcome::Skipped {
                    reason: SkipReason::NoMidPrice,
                    signals: None,
                };
            }
        };

        let signals = self.compute_signals(mid_price);

        match self
            .refresher
            .begin_refresh(mid_price, signals.spreads, now_ms)
        {
            Ok(()) => TickOutcome::RefreshStarted(signals),
            Err(err) => {
                let reason = match &err {
                    StrategyError::InsufficientBalance { .. } => {
                        warn!(error = %err, "Insufficient balance for orders");
                        SkipReason::InsufficientBalance
                    }
                    StrategyError::RefreshInFlight => {
                        debug!("Previous refresh still in flight");
                        SkipReason::RefreshInFlight
                    }
                    StrategyError::Overflow(_) => {
                        warn!(error = %err, mid = %mid_price, "Skipping tick");
                        SkipReason::Overflow
                    }
                    _ => {
                        error!(error = %err, "Could not start refresh");
                        SkipReason::NoRuntime
                    }
                };
                TickOutcome::Skipped {
                    reason,
                    signals: Some(signals),
                }
            }
        }
    }

    /// Push the mid into the window and derive spreads from it.
    fn compute_signals(&mut self, mid_price: Price) -> TickSignals {
        if let Some(mid) = mid_price.inner().to_f64() {
            self.window.push(mid);
        }

        let indicators = self.indicators.snapshot(&self.window);
        let skew = self.inventory.skew(
            self.connector.balance(self.config.pair.base()),
            self.connector.balance(self.config.pair.quote()),
            mid_price,
        );
        info!(
            volatility = %indicators.volatility,
            trend = %indicators.trend,
            skew = %skew,
            "Signals"
        );

        let spreads = self.spreads.spreads(&indicators, skew);
        info!(
            bid_spread = %spreads.bid_spread,
            ask_spread = %spreads.ask_spread,
            "Spreads"
        );

        TickSignals {
            mid_price,
            indicators,
            skew,
            spreads,
        }
    }

    fn mid_price(&self) -> Result<Price, StrategyError> {
        match self.connector.mid_price(&self.config.pair) {
            Some(mid) if mid.is_positive() => Ok(mid),
            _ => Err(StrategyError::NoMidPrice(self.config.pair.to_string())),
        }
    }

    /// Wait for an outstanding cycle and apply it.
    pub async fn settle(&mut self) -> Option<RefreshReport> {
        let report = self.refresher.settle().await?;
        self.completed.push(report.clone());
        Some(report)
    }

    /// Abort any outstanding cycle. The exchange book is left as last attempted.
    pub fn shutdown(&mut self) {
        self.refresher.abort();
        info!(
            pair = %self.config.pair,
            active_orders = self.refresher.orders().len(),
            "Strategy engine stopped"
        );
    }

    /// Drain reports of cycles completed since the last call.
    pub fn take_reports(&mut self) -> Vec<RefreshReport> {
        std::mem::take(&mut self.completed)
    }

    pub fn orders(&self) -> &[OrderRecord] {
        self.refresher.orders()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.refresher.state()
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{ConnectorError, MockCall, MockConnector};
    use crate::indicators::Trend;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    fn funded_mock() -> Arc<MockConnector> {
        let mock = Arc::new(MockConnector::new());
        mock.set_mid_price(Some(Price::new(dec!(80000))));
        mock.set_balance("BTC", dec!(0.125));
        mock.set_balance("USDT", dec!(10000));
        mock
    }

    fn flat_engine(mock: &Arc<MockConnector>) -> StrategyEngine {
        let config = StrategyConfig::default();
        let mut window = PriceWindow::new(config.window_capacity);
        for _ in 0..100 {
            window.push(80_000.0);
        }
        StrategyEngine::with_window(config, mock.clone(), window)
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mock = funded_mock();
        let config = StrategyConfig {
            fast_period: 60,
            ..Default::default()
        };
        assert!(StrategyEngine::new(config, mock).is_err());
    }

    #[test]
    fn test_new_seeds_window() {
        let mock = funded_mock();
        let config = StrategyConfig {
            seed_rng_seed: Some(1),
            ..Default::default()
        };
        let engine = StrategyEngine::new(config, mock.clone()).unwrap();
        assert_eq!(engine.window().len(), 100);

        let unseeded = StrategyConfig {
            seed_window: false,
            ..Default::default()
        };
        let engine = StrategyEngine::new(unseeded, mock).unwrap();
        assert!(engine.window().is_empty());
    }

    #[tokio::test]
    async fn test_tick_starts_refresh_and_settles() {
        let mock = funded_mock();
        let mut engine = flat_engine(&mock);

        let outcome = engine.on_tick(1_000);
        let signals = match outcome {
            TickOutcome::RefreshStarted(signals) => signals,
            other => panic!("expected RefreshStarted, got {other:?}"),
        };
        assert!(signals.indicators.volatility.is_zero());
        assert_eq!(signals.indicators.trend, Trend::Neutral);
        assert!(signals.skew.is_zero());
        assert_eq!(signals.spreads.bid_spread, dec!(0.0005));
        assert_eq!(signals.spreads.ask_spread, dec!(0.0005));

        let report = engine.settle().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(engine.orders().len(), 2);
        assert_eq!(engine.orders()[0].price.inner(), dec!(79960.00));
        assert_eq!(engine.orders()[1].price.inner(), dec!(80040.00));
        assert_eq!(engine.take_reports().len(), 1);
        assert!(engine.take_reports().is_empty());
    }

    #[tokio::test]
    async fn test_tick_not_due_is_noop() {
        let mock = funded_mock();
        let mut engine = flat_engine(&mock);

        assert!(matches!(engine.on_tick(1_000), TickOutcome::RefreshStarted(_)));
        engine.settle().await;
        mock.clear_calls();
        let window_len = engine.window().len();

        assert_eq!(engine.on_tick(2_000), TickOutcome::NotDue);
        assert_eq!(engine.on_tick(150_999), TickOutcome::NotDue);
        assert!(mock.calls().is_empty());
        assert_eq!(engine.window().len(), window_len);

        assert!(matches!(engine.on_tick(151_000), TickOutcome::RefreshStarted(_)));
    }

    #[test]
    fn test_connector_not_ready_skips() {
        let mock = funded_mock();
        mock.set_ready(false);
        let mut engine = flat_engine(&mock);

        assert_eq!(
            engine.on_tick(0),
            TickOutcome::Skipped {
                reason: SkipReason::ConnectorNotReady,
                signals: None
            }
        );
        assert!(mock.calls().is_empty());
        // The interval was consumed: not retried early
        mock.set_ready(true);
        assert_eq!(engine.on_tick(1), TickOutcome::NotDue);
    }

    #[test]
    fn test_missing_or_zero_mid_skips() {
        let mock = funded_mock();
        mock.set_mid_price(None);
        let mut engine = flat_engine(&mock);
        assert!(matches!(
            engine.on_tick(0),
            TickOutcome::Skipped {
                reason: SkipReason::NoMidPrice,
                ..
            }
        ));

        mock.set_mid_price(Some(Price::ZERO));
        assert!(matches!(
            engine.on_tick(150_000),
            TickOutcome::Skipped {
                reason: SkipReason::NoMidPrice,
                ..
            }
        ));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance_skips_cycle() {
        let mock = funded_mock();
        mock.set_available_balance("BTC", dec!(0.005));
        let mut engine = flat_engine(&mock);

        match engine.on_tick(0) {
            TickOutcome::Skipped {
                reason: SkipReason::InsufficientBalance,
                signals: Some(_),
            } => {}
            other => panic!("expected InsufficientBalance skip, got {other:?}"),
        }
        assert_eq!(engine.refresh_state(), RefreshState::Idle);
        assert!(engine.settle().await.is_none());
        assert!(engine.orders().is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_base_balance_quotes_with_full_skew() {
        let mock = funded_mock();
        mock.set_balance("BTC", Decimal::from_i128_with_scale(10i128.pow(24), 0));
        mock.set_balance("USDT", dec!(100000));
        let mut engine = flat_engine(&mock);

        let signals = match engine.on_tick(0) {
            TickOutcome::RefreshStarted(signals) => signals,
            other => panic!("expected RefreshStarted, got {other:?}"),
        };
        assert_eq!(signals.skew, Decimal::ONE);
        // Long inventory: ask pulled in, bid pushed out
        assert!(signals.spreads.ask_spread < signals.spreads.bid_spread);

        let report = engine.settle().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(engine.orders().len(), 2);
    }

    #[tokio::test]
    async fn test_unrepresentable_quote_price_skips_cycle() {
        let mock = funded_mock();
        mock.set_mid_price(Some(Price::new(Decimal::MAX)));
        mock.set_balance("USDT", Decimal::MAX);
        let mut engine = flat_engine(&mock);

        match engine.on_tick(0) {
            TickOutcome::Skipped {
                reason: SkipReason::Overflow,
                signals: Some(_),
            } => {}
            other => panic!("expected Overflow skip, got {other:?}"),
        }
        assert_eq!(engine.refresh_state(), RefreshState::Idle);
        assert!(engine.settle().await.is_none());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_error_still_places_both_orders() {
        let mock = funded_mock();
        mock.fail_cancel(Some(ConnectorError::Other("exchange error".into())));
        let mut engine = flat_engine(&mock);

        assert!(matches!(engine.on_tick(0), TickOutcome::RefreshStarted(_)));
        let report = engine.settle().await.unwrap();

        assert!(report.cancel_error.is_some());
        assert_eq!(engine.orders().len(), 2);
        let calls = mock.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], MockCall::CancelAll(_)));
    }

    #[tokio::test]
    async fn test_due_tick_while_in_flight_is_skipped() {
        let mock = funded_mock();
        mock.set_delay(Some(Duration::from_millis(100)));
        let config = StrategyConfig {
            refresh_interval_ms: 10,
            ..Default::default()
        };
        let mut engine = StrategyEngine::with_window(config, mock.clone(), PriceWindow::new(100));

        assert!(matches!(engine.on_tick(0), TickOutcome::RefreshStarted(_)));
        assert_eq!(
            engine.on_tick(50),
            TickOutcome::Skipped {
                reason: SkipReason::RefreshInFlight,
                signals: None
            }
        );

        engine.settle().await.unwrap();
        assert!(matches!(engine.on_tick(60), TickOutcome::RefreshStarted(_)));
        engine.settle().await.unwrap();
        // Two cycles, never overlapping: cancel, buy, sell, cancel, buy, sell
        assert_eq!(mock.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_completion_applied_on_next_tick() {
        let mock = funded_mock();
        let mut engine = flat_engine(&mock);

        assert!(matches!(engine.on_tick(0), TickOutcome::RefreshStarted(_)));
        // Let the spawned cycle run to completion
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if mock.calls().len() == 3 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(engine.on_tick(1_000), TickOutcome::NotDue);
        assert_eq!(engine.orders().len(), 2);
        assert_eq!(engine.take_reports().len(), 1);
    }

    #[test]
    fn test_without_runtime_skips() {
        let mock = funded_mock();
        let mut engine = flat_engine(&mock);
        assert!(matches!(
            engine.on_tick(0),
            TickOutcome::Skipped {
                reason: SkipReason::NoRuntime,
                signals: Some(_)
            }
        ));
        assert_eq!(engine.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_in_flight() {
        let mock = funded_mock();
        mock.set_delay(Some(Duration::from_secs(10)));
        let mut engine = flat_engine(&mock);

        assert!(matches!(engine.on_tick(0), TickOutcome::RefreshStarted(_)));
        engine.shutdown();
        assert_eq!(engine.refresh_state(), RefreshState::Idle);
        assert!(engine.orders().is_empty());
    }

    #[test]
    fn test_skip_reason_labels() {
        assert_eq!(SkipReason::ConnectorNotReady.as_str(), "connector_not_ready");
        assert_eq!(SkipReason::InsufficientBalance.as_str(), "insufficient_balance");
        assert_eq!(SkipReason::Overflow.as_str(), "arithmetic_overflow");
    }
}
