//! Error types for spreadbot-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid trading pair: {0}")]
    InvalidPair(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
