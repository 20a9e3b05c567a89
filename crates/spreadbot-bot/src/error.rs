//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy setup error: {0}")]
    Strategy(#[from] spreadbot_core::CoreError),
}

pub type AppResult<T> = Result<T, AppError>;
