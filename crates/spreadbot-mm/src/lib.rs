//! Signal-driven market making strategy for a single trading pair.
//!
//! Every refresh interval the engine turns recent mid prices and account
//! balances into a pair of replacement limit orders:
//! - Volatility (Bollinger band width) and trend (fast/slow average crossover)
//! - Inventory skew from the base/quote value split
//! - Asymmetric bid/ask spreads under configured bounds
//! - Cancel-then-replace of the outstanding quotes
//!
//! # Architecture
//!
//! ```text
//! scheduler → StrategyEngine.on_tick(now_ms)
//!              ├─ PriceWindow: push latest mid
//!              ├─ IndicatorEngine: volatility + trend
//!              ├─ InventoryModel: skew from balances
//!              ├─ SpreadCalculator: bid/ask spreads
//!              └─ QuoteRefresher: balance check → cancel_all → buy + sell
//!                   ↓ (spawned, awaited off the tick)
//!                 ExchangeConnector
//! ```

pub mod config;
pub mod connector;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod inventory;
pub mod price_window;
pub mod refresher;
pub mod spread;

pub use config::StrategyConfig;
pub use connector::{
    BoxFuture, ConnectorError, DynConnector, ExchangeConnector, MockCall, MockConnector,
};
pub use engine::{SkipReason, StrategyEngine, TickOutcome, TickSignals};
pub use error::{StrategyError, StrategyResult};
pub use indicators::{IndicatorEngine, IndicatorSnapshot, Trend};
pub use inventory::InventoryModel;
pub use price_window::PriceWindow;
pub use refresher::{QuoteRefresher, RefreshReport, RefreshState};
pub use spread::{SpreadCalculator, SpreadPair};
