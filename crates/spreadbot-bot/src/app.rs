//! Main application orchestration.
//!
//! Drives the strategy against the paper exchange:
//! - Tick scheduler (`tokio::time::interval`)
//! - Paper market step before every tick
//! - Metrics from tick outcomes and refresh reports
//! - Ctrl-C / tick-limit shutdown

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::paper::PaperConnector;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use spreadbot_mm::{
    ExchangeConnector, RefreshReport, StrategyEngine, TickOutcome, TickSignals, Trend,
};
use spreadbot_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub ticks: u64,
    pub refreshes: u64,
    pub active_orders: usize,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    paper: Arc<PaperConnector>,
    engine: StrategyEngine,
    summary: SessionSummary,
}

impl Application {
    /// Create the paper exchange and the strategy engine.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let paper = Arc::new(PaperConnector::new(
            config.strategy.pair.clone(),
            &config.paper,
        ));
        let engine = StrategyEngine::new(config.strategy.clone(), paper.clone())?;

        info!(
            pair = %config.strategy.pair,
            order_amount = %config.strategy.order_amount,
            refresh_interval_ms = config.strategy.refresh_interval_ms,
            start_mid = %config.paper.start_mid,
            "Application initialized (paper trading)"
        );

        Ok(Self {
            config,
            paper,
            engine,
            summary: SessionSummary::default(),
        })
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    pub fn paper(&self) -> &Arc<PaperConnector> {
        &self.paper
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Step the paper market, then run one strategy tick at `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        self.summary.ticks += 1;
        let mid = self.paper.step();
        debug!(tick = self.summary.ticks, %mid, "Paper market step");

        let outcome = self.engine.on_tick(now_ms);
        record_outcome(&outcome);
        self.drain_reports(now_ms);
        outcome
    }

    /// Wait for an outstanding refresh and record it.
    pub async fn settle(&mut self) {
        self.engine.settle().await;
        self.drain_reports(unix_millis());
    }

    /// Run until Ctrl-C or `max_ticks`.
    pub async fn run(mut self) -> AppResult<SessionSummary> {
        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            max_ticks = ?self.config.max_ticks,
            "Starting application"
        );

        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(unix_millis());

                    if let Some(max_ticks) = self.config.max_ticks {
                        if self.summary.ticks >= max_ticks {
                            info!(max_ticks, "Tick limit reached");
                            self.settle().await;
                            break;
                        }
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(self.shutdown())
    }

    /// Abort any in-flight refresh and report the session.
    pub fn shutdown(&mut self) -> SessionSummary {
        self.engine.shutdown();
        self.summary.active_orders = self.engine.orders().len();
        Metrics::active_orders(self.summary.active_orders);

        let pair = &self.config.strategy.pair;
        info!(
            ticks = self.summary.ticks,
            refreshes = self.summary.refreshes,
            active_orders = self.summary.active_orders,
            base_balance = %self.paper.balance(pair.base()),
            quote_balance = %self.paper.balance(pair.quote()),
            "Shutting down"
        );
        self.summary
    }

    fn drain_reports(&mut self, now_ms: u64) {
        for report in self.engine.take_reports() {
            self.summary.refreshes += 1;
            record_report(&report, now_ms);
        }
        Metrics::active_orders(self.engine.orders().len());
    }
}

fn record_outcome(outcome: &TickOutcome) {
    match outcome {
        TickOutcome::NotDue => Metrics::tick_not_due(),
        TickOutcome::Skipped { reason, signals } => {
            Metrics::tick_skipped(reason.as_str());
            if let Some(signals) = signals {
                record_signals(signals);
            }
        }
        TickOutcome::RefreshStarted(signals) => {
            Metrics::tick_refreshed();
            record_signals(signals);
        }
    }
}

fn record_signals(signals: &TickSignals) {
    let trend = match signals.indicators.trend {
        Trend::Up => 1.0,
        Trend::Down => -1.0,
        Trend::Neutral => 0.0,
    };
    Metrics::signals(
        as_f64(signals.indicators.volatility),
        as_f64(signals.skew),
        trend,
    );
    Metrics::spreads(
        as_f64(signals.spreads.bid_spread),
        as_f64(signals.spreads.ask_spread),
    );
}

fn record_report(report: &RefreshReport, now_ms: u64) {
    let result = if report.is_complete() {
        "complete"
    } else if report.placed.is_empty() {
        "failed"
    } else {
        "partial"
    };
    let duration_ms = now_ms.saturating_sub(report.started_at_ms) as f64;
    Metrics::refresh_completed(result, duration_ms);

    if report.cancel_error.is_some() {
        Metrics::call_failed("cancel_all");
    }
    for (side, _) in &report.failures {
        Metrics::call_failed(&side.to_string());
    }

    info!(
        result,
        mid = %report.mid_price,
        bid = %report.bid_price,
        ask = %report.ask_price,
        placed = report.placed.len(),
        "Refresh completed"
    );
}

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Current Unix time in milliseconds.
fn unix_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
