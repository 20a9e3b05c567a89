//! Strategy error types.
//!
//! None of these escape `StrategyEngine::on_tick`; they are produced by the
//! individual stages, logged at the tick boundary, and turned into a
//! `TickOutcome` or a `RefreshReport`.

use rust_decimal::Decimal;
use spreadbot_core::OrderSide;
use thiserror::Error;

use crate::connector::ConnectorError;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Insufficient price data: need {needed} samples, have {available}")]
    DataInsufficient { needed: usize, available: usize },

    #[error("Connector not ready")]
    ConnectorNotReady,

    #[error("No mid price available for {0}")]
    NoMidPrice(String),

    #[error("Insufficient {asset} balance: available {available}, required {required}")]
    InsufficientBalance {
        asset: String,
        available: Decimal,
        required: Decimal,
    },

    #[error("Cancel failed: {0}")]
    CancelFailed(#[source] ConnectorError),

    #[error("Placement failed ({side}): {source}")]
    PlacementFailed {
        side: OrderSide,
        #[source]
        source: ConnectorError,
    },

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("A refresh cycle is already in flight")]
    RefreshInFlight,

    #[error("No async runtime available to run the refresh cycle")]
    NoRuntime,
}

pub type StrategyResult<T> = Result<T, StrategyError>;
