//! Quote refresh cycle.
//!
//! One refresh cancels every open order on the pair and places a fresh
//! bid/ask pair:
//!
//! ```text
//! Idle ──due──▶ BalanceCheck ──ok──▶ Cancelling ──▶ Placing ──▶ Idle
//!                    │ insufficient                       (order set replaced)
//!                    └──────────────▶ Idle
//! ```
//!
//! Cancellation is best effort: a failed or timed-out `cancel_all` is logged
//! and placement goes ahead, so stale orders can briefly coexist with the new
//! pair. A failed placement leaves that side out of the new order set.
//!
//! The cancel/place sequence runs as a spawned task so the tick never blocks.
//! At most one cycle is outstanding; its result is handed back over a
//! oneshot channel and applied by the owner on a later tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spreadbot_core::{OrderRecord, OrderSide, Price, Size, TradingPair};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::StrategyConfig;
use crate::connector::{BoxFuture, ConnectorError, DynConnector};
use crate::error::{StrategyError, StrategyResult};
use crate::spread::SpreadPair;

/// Refresh cycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    BalanceCheck,
    Cancelling,
    Placing,
}

/// Result of one completed refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    /// Tick timestamp the cycle was started on (Unix milliseconds).
    pub started_at_ms: u64,
    pub mid_price: Price,
    pub spreads: SpreadPair,
    pub bid_price: Price,
    pub ask_price: Price,
    /// Set when `cancel_all` failed or timed out.
    pub cancel_error: Option<ConnectorError>,
    /// Orders that were accepted; becomes the new active set.
    pub placed: Vec<OrderRecord>,
    /// Sides whose submission failed.
    pub failures: Vec<(OrderSide, ConnectorError)>,
}

impl RefreshReport {
    /// Both sides placed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.placed.len() == 2
    }

    /// Failures as strategy errors, for logging and metrics.
    pub fn errors(&self) -> Vec<StrategyError> {
        let mut errors = Vec::new();
        if let Some(err) = &self.cancel_error {
            errors.push(StrategyError::CancelFailed(err.clone()));
        }
        for (side, err) in &self.failures {
            errors.push(StrategyError::PlacementFailed {
                side: *side,
                source: err.clone(),
            });
        }
        errors
    }
}

/// Inputs of one cancel/place sequence, owned by the task running it.
struct CycleContext {
    connector: DynConnector,
    pair: TradingPair,
    amount: Size,
    mid_price: Price,
    spreads: SpreadPair,
    bid_price: Price,
    ask_price: Price,
    call_timeout: Duration,
    started_at_ms: u64,
}

/// Phase publisher handed to one cycle.
///
/// Writes are dropped once `abort` has moved the refresher to a newer
/// generation, so a task still winding down cannot overwrite `Idle`.
struct PhaseSender {
    tx: Arc<watch::Sender<RefreshState>>,
    generation: Arc<AtomicU64>,
    cycle: u64,
}

impl PhaseSender {
    fn set(&self, state: RefreshState) {
        self.tx.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != self.cycle || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}

/// A cycle running on the runtime.
struct InFlight {
    outcome: oneshot::Receiver<RefreshReport>,
    task: JoinHandle<()>,
}

/// Owns the active order set and runs refresh cycles for one pair.
pub struct QuoteRefresher {
    connector: DynConnector,
    pair: TradingPair,
    order_amount: Size,
    price_precision: u32,
    call_timeout: Duration,
    refresh_interval_ms: u64,
    /// Tick timestamp of the last due tick.
    last_refresh_ms: Option<u64>,
    /// Active orders from the last completed cycle.
    orders: Vec<OrderRecord>,
    /// Current phase, readable from outside and updated by the running task.
    phase: Arc<watch::Sender<RefreshState>>,
    /// Bumped by `abort`; stale cycles stop publishing phases.
    generation: Arc<AtomicU64>,
    in_flight: Option<InFlight>,
}

impl QuoteRefresher {
    pub fn new(config: &StrategyConfig, connector: DynConnector) -> Self {
        let (phase, _) = watch::channel(RefreshState::Idle);
        Self {
            connector,
            pair: config.pair.clone(),
            order_amount: config.order_amount,
            price_precision: config.price_precision,
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            refresh_interval_ms: config.refresh_interval_ms,
            last_refresh_ms: None,
            orders: Vec::new(),
            phase: Arc::new(phase),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: None,
        }
    }

    /// Current phase.
    pub fn state(&self) -> RefreshState {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.phase.subscribe()
    }

    /// Active orders from the last completed cycle.
    pub fn orders(&self) -> &[OrderRecord] {
        &self.orders
    }

    /// Whether a cycle is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether the refresh interval has elapsed since the last due tick.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_refresh_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.refresh_interval_ms,
        }
    }

    /// Record `now_ms` as the start of the current interval.
    pub fn mark_refreshed(&mut self, now_ms: u64) {
        self.last_refresh_ms = Some(now_ms);
    }

    /// Bid and ask limit prices for a mid and spread pair, on the price grid.
    pub fn quote_prices(
        &self,
        mid_price: Price,
        spreads: &SpreadPair,
    ) -> StrategyResult<(Price, Price)> {
        let bid = mid_price
            .below_by(spreads.bid_spread)
            .ok_or(StrategyError::Overflow("bid price"))?
            .round_to_precision(self.price_precision);
        let ask = mid_price
            .above_by(spreads.ask_spread)
            .ok_or(StrategyError::Overflow("ask price"))?
            .round_to_precision(self.price_precision);
        Ok((bid, ask))
    }

    /// Both legs must be fundable: `order_amount` of base for the ask and
    /// `order_amount × mid` of quote for the bid.
    pub fn check_balance(&self, mid_price: Price) -> StrategyResult<()> {
        let base_avail = self.connector.available_balance(self.pair.base());
        let required_base = self.order_amount.inner();
        if base_avail < required_base {
            return Err(StrategyError::InsufficientBalance {
                asset: self.pair.base().to_string(),
                available: base_avail,
                required: required_base,
            });
        }

        let quote_avail = self.connector.available_balance(self.pair.quote());
        let required_quote = self
            .order_amount
            .notional(mid_price)
            .ok_or(StrategyError::Overflow("quote notional"))?;
        if quote_avail < required_quote {
            return Err(StrategyError::InsufficientBalance {
                asset: self.pair.quote().to_string(),
                available: quote_avail,
                required: required_quote,
            });
        }

        Ok(())
    }

    /// Start a cycle on the current tokio runtime without waiting for it.
    ///
    /// Fails without side effects if a cycle is already outstanding, the
    /// balances cannot fund both legs, or no runtime is available. The
    /// result is picked up by `poll_completion` or `settle`.
    pub fn begin_refresh(
        &mut self,
        mid_price: Price,
        spreads: SpreadPair,
        now_ms: u64,
    ) -> StrategyResult<()> {
        let ctx = self.prepare(mid_price, spreads, now_ms)?;

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                self.phase.send_replace(RefreshState::Idle);
                return Err(StrategyError::NoRuntime);
            }
        };

        let (tx, rx) = oneshot::channel();
        let phase = self.cycle_phase();
        let task = runtime.spawn(async move {
            let report = run_cycle(ctx, &phase).await;
            // Receiver gone means the owner was dropped; nothing to report to.
            let _ = tx.send(report);
        });

        self.in_flight = Some(InFlight { outcome: rx, task });
        Ok(())
    }

    /// Run a cycle to completion in the caller's task and apply it.
    pub async fn refresh(
        &mut self,
        mid_price: Price,
        spreads: SpreadPair,
        now_ms: u64,
    ) -> StrategyResult<RefreshReport> {
        let ctx = self.prepare(mid_price, spreads, now_ms)?;
        let phase = self.cycle_phase();
        let report = run_cycle(ctx, &phase).await;
        self.apply(&report);
        Ok(report)
    }

    /// Apply the outstanding cycle's result if it has finished.
    pub fn poll_completion(&mut self) -> Option<RefreshReport> {
        let in_flight = self.in_flight.as_mut()?;
        match in_flight.outcome.try_recv() {
            Ok(report) => {
                self.in_flight = None;
                self.apply(&report);
                Some(report)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                error!(pair = %self.pair, "Refresh task ended without a result, keeping previous order set");
                self.in_flight = None;
                self.phase.send_replace(RefreshState::Idle);
                None
            }
        }
    }

    /// Wait for the outstanding cycle, if any, and apply it.
    pub async fn settle(&mut self) -> Option<RefreshReport> {
        let in_flight = self.in_flight.take()?;
        match in_flight.outcome.await {
            Ok(report) => {
                self.apply(&report);
                Some(report)
            }
            Err(_) => {
                error!(pair = %self.pair, "Refresh task ended without a result, keeping previous order set");
                self.phase.send_replace(RefreshState::Idle);
                None
            }
        }
    }

    /// Abort the outstanding cycle.
    ///
    /// Whatever the exchange accepted before the abort stays there; the
    /// local order set is left as it was before the cycle started.
    pub fn abort(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            // The task may still be mid-poll on another worker
            self.generation.fetch_add(1, Ordering::SeqCst);
            warn!(
                pair = %self.pair,
                phase = ?self.state(),
                "Refresh cycle aborted, exchange book left as last attempted"
            );
            self.phase.send_replace(RefreshState::Idle);
        }
    }

    /// Gate, balance check and price computation shared by both entry points.
    fn prepare(
        &mut self,
        mid_price: Price,
        spreads: SpreadPair,
        now_ms: u64,
    ) -> StrategyResult<CycleContext> {
        if self.in_flight.is_some() {
            return Err(StrategyError::RefreshInFlight);
        }

        self.phase.send_replace(RefreshState::BalanceCheck);
        let prices = self
            .check_balance(mid_price)
            .and_then(|()| self.quote_prices(mid_price, &spreads));
        let (bid_price, ask_price) = match prices {
            Ok(prices) => prices,
            Err(err) => {
                self.phase.send_replace(RefreshState::Idle);
                return Err(err);
            }
        };
        debug!(
            pair = %self.pair,
            mid = %mid_price,
            bid = %bid_price,
            ask = %ask_price,
            "Balance check passed, starting refresh"
        );

        Ok(CycleContext {
            connector: Arc::clone(&self.connector),
            pair: self.pair.clone(),
            amount: self.order_amount,
            mid_price,
            spreads,
            bid_price,
            ask_price,
            call_timeout: self.call_timeout,
            started_at_ms: now_ms,
        })
    }

    fn cycle_phase(&self) -> PhaseSender {
        PhaseSender {
            tx: Arc::clone(&self.phase),
            generation: Arc::clone(&self.generation),
            cycle: self.generation.load(Ordering::SeqCst),
        }
    }

    fn apply(&mut self, report: &RefreshReport) {
        self.orders = report.placed.clone();
        self.phase.send_replace(RefreshState::Idle);
        info!(
            pair = %self.pair,
            active_orders = self.orders.len(),
            cancel_ok = report.cancel_error.is_none(),
            "Order set replaced"
        );
    }
}

impl Drop for QuoteRefresher {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
    }
}

/// Cancel everything, then submit bid and ask in that order.
async fn run_cycle(ctx: CycleContext, phase: &PhaseSender) -> RefreshReport {
    phase.set(RefreshState::Cancelling);
    let cancel_error = match with_timeout(
        "cancel_all",
        ctx.call_timeout,
        ctx.connector.cancel_all(&ctx.pair),
    )
    .await
    {
        Ok(()) => None,
        Err(err) => {
            error!(pair = %ctx.pair, error = %err, "Error canceling orders, placing new quotes anyway");
            Some(err)
        }
    };

    phase.set(RefreshState::Placing);
    let mut placed = Vec::with_capacity(2);
    let mut failures = Vec::new();

    for (side, price) in [(OrderSide::Buy, ctx.bid_price), (OrderSide::Sell, ctx.ask_price)] {
        let (operation, submit) = match side {
            OrderSide::Buy => (
                "submit_buy",
                ctx.connector.submit_buy(&ctx.pair, ctx.amount, price),
            ),
            OrderSide::Sell => (
                "submit_sell",
                ctx.connector.submit_sell(&ctx.pair, ctx.amount, price),
            ),
        };

        match with_timeout(operation, ctx.call_timeout, submit).await {
            Ok(id) => {
                info!(pair = %ctx.pair, %side, %price, amount = %ctx.amount, order_id = %id, "Order placed");
                placed.push(OrderRecord {
                    id,
                    side,
                    price,
                    amount: ctx.amount,
                    placed_at_ms: ctx.started_at_ms,
                });
            }
            Err(err) => {
                error!(pair = %ctx.pair, %side, %price, error = %err, "Order placement failed");
                failures.push((side, err));
            }
        }
    }

    RefreshReport {
        started_at_ms: ctx.started_at_ms,
        mid_price: ctx.mid_price,
        spreads: ctx.spreads,
        bid_price: ctx.bid_price,
        ask_price: ctx.ask_price,
        cancel_error,
        placed,
        failures,
    }
}

async fn with_timeout<T>(
    operation: &'static str,
    limit: Duration,
    call: BoxFuture<'_, Result<T, ConnectorError>>,
) -> Result<T, ConnectorError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Timeout {
            operation,
            after_ms: limit.as_millis() as u64,
        }),
    }
}
