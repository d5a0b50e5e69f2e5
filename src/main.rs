// src/main.rs
// =============================================================================
// Process bootstrap: parse the CLI, configure logging once, build the shared
// crawler, and hand control to the HTTP front end. The only fatal error here
// is failing to start the listener (or to build the HTTP client).
// =============================================================================

mod api;
mod cli;
mod crawler;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use crawler::{Crawler, CrawlerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = CrawlerConfig::default();
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    let crawler = Crawler::new(config).context("failed to build HTTP client")?;

    tracing::info!("crawler started");
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    api::serve(addr, crawler).await
}
