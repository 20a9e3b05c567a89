//! Core domain types for the spreadbot market maker.
//!
//! This crate provides the primitives shared by the strategy and the binary:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `TradingPair`: Base/quote asset pair (e.g. "BTC-USDT")
//! - `OrderSide`, `OrderId`, `OrderRecord`: Order bookkeeping types

pub mod decimal;
pub mod error;
pub mod order;
pub mod pair;

pub use decimal::{Price, Size};
pub use error::CoreError;
pub use order::{OrderId, OrderRecord, OrderSide};
pub use pair::TradingPair;
