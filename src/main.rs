//! Babble Server
//!
//! Run with: cargo run -- --addr 0.0.0.0:8080
//!
//! # Configuration
//!
//! Environment variables:
//! - `BABBLE_HOST`: Host to bind to (default: 0.0.0.0)
//! - `BABBLE_PORT`: Port to listen on (default: 8080)
//! - `BABBLE_LOG_LEVEL`: Log level (default: info)
//! - `BABBLE_LOG_FORMAT`: Log format, pretty or json (default: pretty)
//! - `RUST_LOG`: Overrides the log filter entirely

use anyhow::Context;
use babble::api::{serve, AppState};
use babble::config::Config;
use babble::hub::Hub;
use babble::trace;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Minimal real-time chat broadcaster
#[derive(Parser)]
#[command(name = "babble", version, about)]
struct Cli {
    /// Listen address as host:port (overrides config and environment)
    #[arg(long)]
    addr: Option<String>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print hub trace events (joins, leaves, deliveries, evictions) to stdout
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Config::load_default(),
    };

    if let Some(addr) = &cli.addr {
        apply_addr(&mut config, addr)?;
    }

    init_logging(&config);

    tracing::info!("Starting Babble v{}", env!("CARGO_PKG_VERSION"));

    let tracer = if cli.trace {
        trace::to_stdout()
    } else {
        trace::off()
    };

    let (hub, hub_task) = Hub::spawn(config.hub.clone(), tracer);
    let server_config = config.server.clone();
    let state = AppState::new(hub, config);

    serve(state, &server_config).await?;

    hub_task.abort();
    tracing::info!("Babble stopped");
    Ok(())
}

/// Apply a `host:port` override from the command line. An empty host
/// (`:8080`) keeps the configured host and changes only the port.
fn apply_addr(config: &mut Config, addr: &str) -> anyhow::Result<()> {
    let (host, port) = addr
        .rsplit_once(':')
        .with_context(|| format!("invalid listen address {:?}, expected host:port", addr))?;

    if !host.is_empty() {
        config.server.host = host.to_string();
    }
    config.server.port = port
        .parse()
        .with_context(|| format!("invalid port in listen address {:?}", addr))?;

    Ok(())
}

/// Initialize tracing with the configured level and format
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("babble={},tower_http=warn", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
