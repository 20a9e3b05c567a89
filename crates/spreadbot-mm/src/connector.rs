//! Exchange connector trait.
//!
//! The strategy never talks to an exchange directly. Everything it needs
//! (readiness, mid price, balances, cancel, submit) goes through
//! `ExchangeConnector`, which allows for:
//! - Unit testing with `MockConnector`
//! - Paper trading and live backends behind the same engine

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use spreadbot_core::{OrderId, Price, Size, TradingPair};
use thiserror::Error;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Failure reported by (or on behalf of) the connector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    #[error("connector not ready")]
    NotReady,

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    #[error("{0}")]
    Other(String),
}

/// Order management and account access for one venue.
///
/// Query methods are synchronous and expected to read cached state.
/// Order methods return futures; the engine awaits them off the tick.
pub trait ExchangeConnector: Send + Sync {
    /// Whether the connector has the market data and account state it needs.
    fn is_ready(&self) -> bool;

    /// Mid price (average of best bid and best ask), if the book has both sides.
    fn mid_price(&self, pair: &TradingPair) -> Option<Price>;

    /// Total balance of an asset, including amounts locked in open orders.
    fn balance(&self, asset: &str) -> Decimal;

    /// Balance of an asset free for new orders.
    fn available_balance(&self, asset: &str) -> Decimal;

    /// Cancel every open order on the pair.
    fn cancel_all<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, Result<(), ConnectorError>>;

    /// Submit a limit buy.
    fn submit_buy<'a>(
        &'a self,
        pair: &'a TradingPair,
        amount: Size,
        price: Price,
    ) -> BoxFuture<'a, Result<OrderId, ConnectorError>>;

    /// Submit a limit sell.
    fn submit_sell<'a>(
        &'a self,
        pair: &'a TradingPair,
        amount: Size,
        price: Price,
    ) -> BoxFuture<'a, Result<OrderId, ConnectorError>>;
}

/// Arc wrapper for connector trait objects.
pub type DynConnector = Arc<dyn ExchangeConnector>;

/// A call recorded by `MockConnector`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CancelAll(TradingPair),
    Buy { amount: Size, price: Price },
    Sell { amount: Size, price: Price },
}

/// Mock connector for testing.
///
/// Balances and mid price are set directly; order calls are recorded and can
/// be scripted to fail or to stall for a fixed delay.
#[derive(Debug)]
pub struct MockConnector {
    ready: AtomicBool,
    mid: Mutex<Option<Price>>,
    balances: Mutex<HashMap<String, Decimal>>,
    available: Mutex<HashMap<String, Decimal>>,
    calls: Mutex<Vec<MockCall>>,
    cancel_error: Mutex<Option<ConnectorError>>,
    buy_error: Mutex<Option<ConnectorError>>,
    sell_error: Mutex<Option<ConnectorError>>,
    delay: Mutex<Option<Duration>>,
    next_id: AtomicU64,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Create a ready mock with no balances and no mid price.
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            mid: Mutex::new(None),
            balances: Mutex::new(HashMap::new()),
            available: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            cancel_error: Mutex::new(None),
            buy_error: Mutex::new(None),
            sell_error: Mutex::new(None),
            delay: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_mid_price(&self, mid: Option<Price>) {
        *self.mid.lock() = mid;
    }

    /// Set total and available balance of an asset to the same amount.
    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.balances.lock().insert(asset.to_string(), amount);
        self.available.lock().insert(asset.to_string(), amount);
    }

    /// Override only the available balance of an asset.
    pub fn set_available_balance(&self, asset: &str, amount: Decimal) {
        self.available.lock().insert(asset.to_string(), amount);
    }

    /// Make every subsequent `cancel_all` fail with `error` (`None` = succeed).
    pub fn fail_cancel(&self, error: Option<ConnectorError>) {
        *self.cancel_error.lock() = error;
    }

    /// Make every subsequent `submit_buy` fail with `error` (`None` = succeed).
    pub fn fail_buy(&self, error: Option<ConnectorError>) {
        *self.buy_error.lock() = error;
    }

    /// Make every subsequent `submit_sell` fail with `error` (`None` = succeed).
    pub fn fail_sell(&self, error: Option<ConnectorError>) {
        *self.sell_error.lock() = error;
    }

    /// Stall every order call for `delay` before responding.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Recorded order calls, in call order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn stall(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn next_order_id(&self, side: &str) -> OrderId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        OrderId::new(format!("mock-{side}-{n}"))
    }
}

impl ExchangeConnector for MockConnector {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn mid_price(&self, _pair: &TradingPair) -> Option<Price> {
        *self.mid.lock()
    }

    fn balance(&self, asset: &str) -> Decimal {
        self.balances
            .lock()
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn available_balance(&self, asset: &str) -> Decimal {
        self.available
            .lock()
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn cancel_all<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, Result<(), ConnectorError>> {
        Box::pin(async move {
            self.stall().await;
            self.calls.lock().push(MockCall::CancelAll(pair.clone()));
            match self.cancel_error.lock().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn submit_buy<'a>(
        &'a self,
        _pair: &'a TradingPair,
        amount: Size,
        price: Price,
    ) -> BoxFuture<'a, Result<OrderId, ConnectorError>> {
        Box::pin(async move {
            self.stall().await;
            self.calls.lock().push(MockCall::Buy { amount, price });
            match self.buy_error.lock().clone() {
                Some(err) => Err(err),
                None => Ok(self.next_order_id("buy")),
            }
        })
    }

    fn submit_sell<'a>(
        &'a self,
        _pair: &'a TradingPair,
        amount: Size,
        price: Price,
    ) -> BoxFuture<'a, Result<OrderId, ConnectorError>> {
        Box::pin(async move {
            self.stall().await;
            self.calls.lock().push(MockCall::Sell { amount, price });
            match self.sell_error.lock().clone() {
                Some(err) => Err(err),
                None => Ok(self.next_order_id("sell")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pair() -> TradingPair {
        TradingPair::new("BTC", "USDT")
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let mock = MockConnector::new();
        mock.cancel_all(&pair()).await.unwrap();
        let id = mock
            .submit_buy(&pair(), Size::new(dec!(0.01)), Price::new(dec!(79960)))
            .await
            .unwrap();
        assert!(id.as_str().starts_with("mock-buy-"));

        assert_eq!(
            mock.calls(),
            vec![
                MockCall::CancelAll(pair()),
                MockCall::Buy {
                    amount: Size::new(dec!(0.01)),
                    price: Price::new(dec!(79960)),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_scripted_failures() {
        let mock = MockConnector::new();
        mock.fail_cancel(Some(ConnectorError::Disconnected("socket closed".into())));
        mock.fail_sell(Some(ConnectorError::Rejected("post only".into())));

        assert!(mock.cancel_all(&pair()).await.is_err());
        assert!(mock
            .submit_buy(&pair(), Size::new(dec!(1)), Price::new(dec!(1)))
            .await
            .is_ok());
        assert_eq!(
            mock.submit_sell(&pair(), Size::new(dec!(1)), Price::new(dec!(2)))
                .await,
            Err(ConnectorError::Rejected("post only".into()))
        );
        // Failed calls are still recorded
        assert_eq!(mock.calls().len(), 3);
    }

    #[test]
    fn test_mock_balances() {
        let mock = MockConnector::new();
        mock.set_balance("BTC", dec!(1));
        mock.set_available_balance("BTC", dec!(0.4));
        assert_eq!(mock.balance("BTC"), dec!(1));
        assert_eq!(mock.available_balance("BTC"), dec!(0.4));
        assert_eq!(mock.balance("ETH"), Decimal::ZERO);
    }

    #[test]
    fn test_mock_ready_and_mid() {
        let mock = MockConnector::new();
        assert!(mock.is_ready());
        assert!(mock.mid_price(&pair()).is_none());

        mock.set_ready(false);
        mock.set_mid_price(Some(Price::new(dec!(80000))));
        assert!(!mock.is_ready());
        assert_eq!(mock.mid_price(&pair()), Some(Price::new(dec!(80000))));
    }

    #[test]
    fn test_timeout_display() {
        let err = ConnectorError::Timeout {
            operation: "cancel_all",
            after_ms: 5000,
        };
        assert_eq!(err.to_string(), "cancel_all timed out after 5000ms");
    }
}
