//! Paper-trading runner for the spreadbot strategy.
//!
//! Wires the pieces together:
//! - TOML configuration
//! - Simulated exchange (`PaperConnector`)
//! - Tick scheduler driving `StrategyEngine`
//! - Metrics recording and shutdown handling

pub mod app;
pub mod config;
pub mod error;
pub mod paper;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use paper::{PaperConfig, PaperConnector};
