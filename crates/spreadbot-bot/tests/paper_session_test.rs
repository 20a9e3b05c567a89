//! Paper session integration tests.
//!
//! Runs the full scheduler loop against the paper exchange with a short
//! tick and refresh interval.

use spreadbot_bot::{AppConfig, Application, PaperConfig};
use spreadbot_mm::StrategyConfig;
use std::time::Duration;
use tokio::time::timeout;

fn fast_config(max_ticks: u64) -> AppConfig {
    AppConfig {
        tick_interval_ms: 10,
        max_ticks: Some(max_ticks),
        strategy: StrategyConfig {
            refresh_interval_ms: 25,
            seed_rng_seed: Some(11),
            ..Default::default()
        },
        paper: PaperConfig {
            rng_seed: Some(11),
            ..Default::default()
        },
    }
}

/// A bounded run refreshes several times and ends with a live quote pair.
#[tokio::test]
async fn test_bounded_session_keeps_two_orders() {
    let app = Application::new(fast_config(12)).unwrap();

    let summary = timeout(Duration::from_secs(5), app.run())
        .await
        .expect("session should stop at max_ticks")
        .unwrap();

    assert_eq!(summary.ticks, 12);
    assert!(summary.refreshes >= 2, "refreshes={}", summary.refreshes);
    assert!(summary.active_orders <= 2);
}

/// Config files round-trip through the loader.
#[test]
fn test_default_config_file_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");
    let config = AppConfig::from_file(path).unwrap();
    assert_eq!(config.strategy.pair.to_string(), "BTC-USDT");
    assert_eq!(config.strategy.refresh_interval_ms, 150_000);
}
