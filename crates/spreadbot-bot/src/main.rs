//! spreadbot - single-pair market maker, paper trading entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Signal-driven market maker running against a simulated exchange
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SPREADBOT_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    spreadbot_telemetry::init_logging()?;

    info!("Starting spreadbot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > SPREADBOT_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SPREADBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = spreadbot_bot::AppConfig::from_file(&config_path)?;
    info!(pair = %config.strategy.pair, "Configuration loaded");

    let app = spreadbot_bot::Application::new(config)?;
    let summary = app.run().await?;
    info!(?summary, "Stopped");

    Ok(())
}
