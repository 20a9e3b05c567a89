//! Application configuration.

use crate::error::{AppError, AppResult};
use crate::paper::PaperConfig;
use serde::{Deserialize, Serialize};
use spreadbot_mm::StrategyConfig;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduler tick period (ms). The strategy itself only acts once per
    /// `strategy.refresh_interval_ms`.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks. `None` runs until Ctrl-C.
    #[serde(default)]
    pub max_ticks: Option<u64>,

    #[serde(default)]
    pub strategy: StrategyConfig,

    #[serde(default)]
    pub paper: PaperConfig,
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check runner settings and the strategy section.
    pub fn validate(&self) -> AppResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(AppError::Config("tick_interval_ms must be > 0".to_string()));
        }
        if !self.paper.start_mid.is_sign_positive() || self.paper.start_mid.is_zero() {
            return Err(AppError::Config(format!(
                "paper.start_mid must be > 0, got {}",
                self.paper.start_mid
            )));
        }
        if !(0.0..1.0).contains(&self.paper.step_pct) {
            return Err(AppError::Config(format!(
                "paper.step_pct must be in [0, 1), got {}",
                self.paper.step_pct
            )));
        }
        if self.paper.base_balance.is_sign_negative() || self.paper.quote_balance.is_sign_negative()
        {
            return Err(AppError::Config(
                "paper balances must be non-negative".to_string(),
            ));
        }
        self.strategy.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: None,
            strategy: StrategyConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}
