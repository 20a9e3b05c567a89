//! Prometheus metrics for spreadbot.
//!
//! Covers the strategy loop:
//! - Tick outcomes (refreshed, not due, skipped by reason)
//! - Refresh cycle results and per-call failures
//! - Last computed signals and quoted spreads
//! - Size of the active order set
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which must crash at startup. These panics only
//! happen during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
    register_int_gauge, CounterVec, Gauge, GaugeVec, Histogram, IntGauge,
};

/// Ticks processed.
/// Labels: outcome (refresh_started/not_due/skipped)
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadbot_ticks_total",
        "Total strategy ticks by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Due ticks that did not start a refresh.
pub static TICK_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadbot_tick_skipped_total",
        "Total due ticks skipped",
        &["reason"]
    )
    .unwrap()
});

/// Completed refresh cycles.
/// Labels: result (complete/partial/failed)
pub static REFRESH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadbot_refresh_total",
        "Total completed refresh cycles by result",
        &["result"]
    )
    .unwrap()
});

/// Failed exchange calls inside refresh cycles.
/// Labels: operation (cancel_all/buy/sell)
pub static CALL_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "spreadbot_call_failed_total",
        "Total failed exchange calls during refresh",
        &["operation"]
    )
    .unwrap()
});

/// Refresh cycle duration in milliseconds, tick to report.
pub static REFRESH_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "spreadbot_refresh_duration_ms",
        "Refresh cycle duration in milliseconds",
        vec![10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 15000.0]
    )
    .unwrap()
});

/// Last computed volatility.
pub static VOLATILITY: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("spreadbot_volatility", "Last computed Bollinger band width").unwrap()
});

/// Last computed inventory skew.
pub static INVENTORY_SKEW: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("spreadbot_inventory_skew", "Last computed inventory skew").unwrap()
});

/// Last detected trend (1 = up, 0 = neutral, -1 = down).
pub static TREND: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("spreadbot_trend", "Last detected trend (1=up, 0=neutral, -1=down)").unwrap()
});

/// Quoted spread in basis points.
/// Labels: side (bid/ask)
pub static SPREAD_BPS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "spreadbot_spread_bps",
        "Last quoted spread in basis points",
        &["side"]
    )
    .unwrap()
});

/// Orders in the active set.
pub static ACTIVE_ORDERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("spreadbot_active_orders", "Orders in the active set").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a tick that started a refresh.
    pub fn tick_refreshed() {
        TICKS_TOTAL.with_label_values(&["refresh_started"]).inc();
    }

    /// Record a tick before the interval elapsed.
    pub fn tick_not_due() {
        TICKS_TOTAL.with_label_values(&["not_due"]).inc();
    }

    /// Record a due tick that was skipped.
    pub fn tick_skipped(reason: &str) {
        TICKS_TOTAL.with_label_values(&["skipped"]).inc();
        TICK_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record the signals of a due tick.
    pub fn signals(volatility: f64, skew: f64, trend: f64) {
        VOLATILITY.set(volatility);
        INVENTORY_SKEW.set(skew);
        TREND.set(trend);
    }

    /// Record quoted spreads, given as fractions of mid.
    pub fn spreads(bid_spread: f64, ask_spread: f64) {
        SPREAD_BPS.with_label_values(&["bid"]).set(bid_spread * 10_000.0);
        SPREAD_BPS.with_label_values(&["ask"]).set(ask_spread * 10_000.0);
    }

    /// Record a completed refresh cycle.
    pub fn refresh_completed(result: &str, duration_ms: f64) {
        REFRESH_TOTAL.with_label_values(&[result]).inc();
        REFRESH_DURATION_MS.observe(duration_ms);
    }

    /// Record a failed exchange call.
    pub fn call_failed(operation: &str) {
        CALL_FAILED_TOTAL.with_label_values(&[operation]).inc();
    }

    pub fn active_orders(count: usize) {
        ACTIVE_ORDERS.set(count as i64);
    }
}
