//! Simulated exchange for paper trading.
//!
//! `PaperConnector` keeps a random-walk mid price, account balances and a
//! book of resting limit orders. Each `step` moves the mid and fills every
//! resting order the new mid has crossed. Resting orders lock their funds:
//! sells lock base, buys lock quote at the limit price.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use spreadbot_core::{OrderId, OrderSide, Price, Size, TradingPair};
use spreadbot_mm::{BoxFuture, ConnectorError, ExchangeConnector};
use tracing::{debug, info};
use uuid::Uuid;

/// Paper exchange settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Mid price at startup.
    #[serde(default = "default_start_mid")]
    pub start_mid: Decimal,
    /// Largest relative mid move per step (uniform in ±step_pct).
    #[serde(default = "default_step_pct")]
    pub step_pct: f64,
    /// Starting base balance.
    #[serde(default = "default_base_balance")]
    pub base_balance: Decimal,
    /// Starting quote balance.
    #[serde(default = "default_quote_balance")]
    pub quote_balance: Decimal,
    /// Fixed RNG seed for a reproducible walk.
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Simulated round-trip latency of order calls (ms).
    #[serde(default)]
    pub latency_ms: u64,
}

fn default_start_mid() -> Decimal {
    Decimal::from(80_000)
}

fn default_step_pct() -> f64 {
    0.0005
}

fn default_base_balance() -> Decimal {
    Decimal::new(125, 3)
}

fn default_quote_balance() -> Decimal {
    Decimal::from(10_000)
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            start_mid: default_start_mid(),
            step_pct: default_step_pct(),
            base_balance: default_base_balance(),
            quote_balance: default_quote_balance(),
            rng_seed: None,
            latency_ms: 0,
        }
    }
}

/// A limit order resting on the paper book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    pub id: OrderId,
    pub side: OrderSide,
    pub price: Price,
    pub amount: Size,
}

struct PaperState {
    mid: Decimal,
    rng: StdRng,
    balances: HashMap<String, Decimal>,
    orders: Vec<RestingOrder>,
}

impl PaperState {
    fn total(&self, asset: &str) -> Decimal {
        self.balances.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    fn locked(&self, pair: &TradingPair, asset: &str) -> Decimal {
        self.orders
            .iter()
            .map(|o| match o.side {
                OrderSide::Sell if asset == pair.base() => o.amount.inner(),
                OrderSide::Buy if asset == pair.quote() => {
                    o.amount.notional(o.price).unwrap_or(Decimal::MAX)
                }
                _ => Decimal::ZERO,
            })
            .fold(Decimal::ZERO, |acc, x| acc.saturating_add(x))
    }

    fn available(&self, pair: &TradingPair, asset: &str) -> Decimal {
        self.total(asset).saturating_sub(self.locked(pair, asset))
    }

    fn credit(&mut self, asset: &str, delta: Decimal) {
        let balance = self.balances.entry(asset.to_string()).or_insert(Decimal::ZERO);
        *balance = balance.saturating_add(delta);
    }
}

/// In-process exchange implementing `ExchangeConnector` for one pair.
pub struct PaperConnector {
    pair: TradingPair,
    step_pct: f64,
    latency: Duration,
    ready: AtomicBool,
    next_id: AtomicU64,
    state: Mutex<PaperState>,
}

impl PaperConnector {
    pub fn new(pair: TradingPair, config: &PaperConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut balances = HashMap::new();
        balances.insert(pair.base().to_string(), config.base_balance);
        balances.insert(pair.quote().to_string(), config.quote_balance);

        Self {
            pair,
            step_pct: config.step_pct,
            latency: Duration::from_millis(config.latency_ms),
            ready: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            state: Mutex::new(PaperState {
                mid: config.start_mid,
                rng,
                balances,
                orders: Vec::new(),
            }),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Move the mid to an explicit price.
    pub fn set_mid(&self, mid: Price) {
        self.state.lock().mid = mid.inner();
    }

    /// Advance the random walk one step and fill crossed orders.
    ///
    /// Returns the new mid.
    pub fn step(&self) -> Price {
        let mut state = self.state.lock();
        let shock = state.rng.gen_range(-self.step_pct..=self.step_pct);
        let factor = Decimal::from_f64(1.0 + shock).unwrap_or(Decimal::ONE);
        if let Some(next) = state.mid.checked_mul(factor) {
            state.mid = next.round_dp(2);
        }
        let mid = Price::new(state.mid);
        self.fill_crossed(&mut state, mid);
        mid
    }

    /// Orders currently resting on the book.
    pub fn resting_orders(&self) -> Vec<RestingOrder> {
        self.state.lock().orders.clone()
    }

    fn fill_crossed(&self, state: &mut PaperState, mid: Price) {
        let (filled, resting): (Vec<_>, Vec<_>) =
            state.orders.drain(..).partition(|o| match o.side {
                OrderSide::Buy => mid <= o.price,
                OrderSide::Sell => mid >= o.price,
            });
        state.orders = resting;

        for order in filled {
            let notional = order.amount.notional(order.price).unwrap_or(Decimal::MAX);
            let (base_delta, quote_delta) = match order.side {
                OrderSide::Buy => (order.amount.inner(), -notional),
                OrderSide::Sell => (-order.amount.inner(), notional),
            };
            state.credit(self.pair.base(), base_delta);
            state.credit(self.pair.quote(), quote_delta);
            info!(
                order_id = %order.id,
                side = %order.side,
                price = %order.price,
                amount = %order.amount,
                "Paper order filled"
            );
        }
    }

    fn place(&self, side: OrderSide, amount: Size, price: Price) -> Result<OrderId, ConnectorError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(ConnectorError::NotReady);
        }
        if !amount.is_positive() || !price.is_positive() {
            return Err(ConnectorError::Rejected(format!(
                "invalid order {amount} @ {price}"
            )));
        }

        let required = match side {
            OrderSide::Buy => amount.notional(price).ok_or_else(|| {
                ConnectorError::Rejected(format!("notional of {amount} @ {price} overflows"))
            })?,
            OrderSide::Sell => amount.inner(),
        };
        let asset = match side {
            OrderSide::Buy => self.pair.quote(),
            OrderSide::Sell => self.pair.base(),
        };

        let mut state = self.state.lock();
        let available = state.available(&self.pair, asset);
        if available < required {
            return Err(ConnectorError::Rejected(format!(
                "insufficient {asset}: available {available}, required {required}"
            )));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = OrderId::new(format!("paper-{n}-{}", &Uuid::new_v4().to_string()[..8]));
        state.orders.push(RestingOrder {
            id: id.clone(),
            side,
            price,
            amount,
        });
        debug!(order_id = %id, %side, %price, %amount, "Paper order resting");
        Ok(id)
    }

    async fn stall(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl ExchangeConnector for PaperConnector {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn mid_price(&self, pair: &TradingPair) -> Option<Price> {
        if *pair != self.pair {
            return None;
        }
        Some(Price::new(self.state.lock().mid))
    }

    fn balance(&self, asset: &str) -> Decimal {
        self.state.lock().total(asset)
    }

    fn available_balance(&self, asset: &str) -> Decimal {
        let state = self.state.lock();
        state.available(&self.pair, asset)
    }

    fn cancel_all<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, Result<(), ConnectorError>> {
        Box::pin(async move {
            self.stall().await;
            if *pair != self.pair {
                return Err(ConnectorError::Other(format!("unknown pair {pair}")));
            }
            let cancelled = {
                let mut state = self.state.lock();
                let n = state.orders.len();
                state.orders.clear();
                n
            };
            debug!(%pair, cancelled, "Paper orders cancelled");
            Ok(())
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
            self.place(OrderSide::Buy, amount, price)
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
            self.place(OrderSide::Sell, amount, price)
        })
    }
}
