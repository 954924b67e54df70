//! Authentication gate (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                     AUTH GATE                         │
//!                    │                                                       │
//!   POST /login      │  ┌─────────┐   ┌──────────────┐   ┌──────────────┐   │
//!   ─────────────────┼─▶│  http   │──▶│   AuthGate   │──▶│ RateLimiter  │   │
//!                    │  │handlers │   │  (attempt)   │   │ (per source) │   │
//!                    │  └─────────┘   └──────┬───────┘   └──────────────┘   │
//!                    │                       │                               │
//!                    │                       ▼                               │
//!                    │               ┌──────────────┐   ┌──────────────┐   │
//!                    │               │Authenticator │   │ EventJournal │   │
//!                    │               │   (users)    │   │  (bounded)   │◀──┼── GET /api/events
//!                    │               └──────────────┘   └──────────────┘   │
//!                    │                                                       │
//!                    │  Cross-cutting: config (reload), observability,       │
//!                    │  lifecycle (signals, shutdown), limiter sweeper        │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use auth_gate::config::{self, ConfigWatcher};
use auth_gate::lifecycle::{signals, Shutdown};
use auth_gate::observability::{logging, metrics};
use auth_gate::GateServer;

#[derive(Parser)]
#[command(name = "auth-gate")]
#[command(about = "Authentication gate with sliding-window failure limiting", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::load_default()?,
    };

    logging::init_logging(&config.observability);

    tracing::info!("auth-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        journal_capacity = config.journal.capacity,
        window_secs = config.rate_limit.window_secs,
        threshold = config.rate_limit.threshold,
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

    // Without a file there is nothing to watch; the sender stays alive so the
    // reloader simply idles.
    let (_idle_tx, idle_rx) = mpsc::unbounded_channel();
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => (None, idle_rx),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown.clone());

    let server = GateServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
