//! Surrogate Key Proxy
//!
//! A reverse proxy placed between a CDN edge and a Drupal-style origin.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │               SURROGATE KEY PROXY                │
//!    CDN edge         │  ┌─────────┐   ┌────────────┐   ┌────────────┐   │
//!   ─────────────────▶│  │  trace  │──▶│ request ID │──▶│  timeout   │   │
//!                     │  └─────────┘   └────────────┘   └─────┬──────┘   │
//!                     │                                       ▼          │
//!                     │                               ┌──────────────┐   │      Origin
//!   ◀─────────────────│───── Surrogate-Key ◀──────────│  surrogate   │◀──┼───── X-Drupal-
//!                     │                               │    layer     │   │      Cache-Tags
//!                     │                               └──────────────┘   │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use surrogate_key_proxy::config::{load_config, ProxyConfig};
use surrogate_key_proxy::lifecycle::{signals, Shutdown};
use surrogate_key_proxy::observability::{logging, metrics};
use surrogate_key_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "surrogate-key-proxy")]
#[command(about = "Mirror cache tags into CDN surrogate keys", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!("surrogate-key-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        request_timeout_secs = config.timeouts.request_secs,
        surrogate_keys = config.surrogate_keys.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
