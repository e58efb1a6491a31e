//! Elite Guard - real-time forex pattern-detection and signal-scoring
//! engine, plus the position-exit FSM that manages what it fires.
//!
//! This binary is intentionally thin: it parses CLI/env configuration,
//! initializes logging, and hands off to [`elite_guard::engine::Engine`].
//! Everything else lives in the library so it can be exercised by tests
//! and the auxiliary `src/bin/*` inspection tools without re-running
//! `main`.

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elite_guard::config::Cli;
use elite_guard::engine::Engine;

fn load_env() {
    let _ = dotenv();
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    info!("elite guard starting up");
    info!(config_dir = %cli.config_dir.display(), data_dir = %cli.data_dir.display(), "loading configuration");

    let engine = Engine::bootstrap(cli).await?;
    engine.run().await
}
