//! lexbot - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lexbot::cli::{self, Args};
use lexbot::BotConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // LOG_LEVEL mirrors the rest of the env-based configuration.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    // Fail fast: a missing key dies here, not at first use.
    let config = BotConfig::from_env().context("invalid configuration")?;

    cli::run(args, config).await
}
