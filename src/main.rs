//! fault-breaker service binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                     FAULT BREAKER                      │
//!                    │                                                        │
//!   failure report   │  ┌─────────┐    ┌────────────────┐    ┌────────────┐   │
//!   ─────────────────┼─▶│  http   │───▶│ ActorDirectory │───▶│CircuitActor│   │
//!                    │  │ server  │    │  (per-key lock)│    │  + window  │   │
//!                    │  └─────────┘    └───────┬────────┘    └────────────┘   │
//!                    │                         │ snapshot / outbox             │
//!                    │                         ▼                               │
//!                    │                 ┌──────────────┐                        │
//!                    │                 │  StateStore  │◀──────────┐            │
//!                    │                 └──────────────┘           │ checkpoint │
//!                    │                         │ execution id     │            │
//!                    │                         ▼                  │            │
//!                    │                 ┌──────────────┐   ┌──────────────┐     │   stop call
//!                    │                 │   executor   │──▶│ orchestrator │─────┼──────────────▶
//!                    │                 │ retry+backoff│   │ (one attempt)│     │  control plane
//!                    │                 └──────────────┘   └──────────────┘     │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use fault_breaker::config::{load_config, load_defaults, BreakerConfig};
use fault_breaker::http::{AppState, HttpServer};
use fault_breaker::lifecycle::{self, signals, Shutdown};
use fault_breaker::observability::{logging, metrics};

const CONFIG_ENV: &str = "FAULT_BREAKER_CONFIG";

#[derive(Parser)]
#[command(name = "fault-breaker")]
#[command(about = "Durable circuit breaker with automated remediation", long_about = None)]
struct Args {
    /// Path to the TOML config file. Falls back to $FAULT_BREAKER_CONFIG.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config_path = args
        .config
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config: BreakerConfig = match &config_path {
        Some(path) => load_config(path)?,
        None => load_defaults()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "fault-breaker starting");
    tracing::info!(
        config = ?config_path,
        bind_address = %config.listener.bind_address,
        window_size = ?config.breaker.window_size,
        failure_threshold = config.breaker.failure_threshold,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let services = lifecycle::start(&config, config_path.as_deref(), None, &shutdown).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = AppState::new(services.directory.clone(), services.store.clone(), config);
    let server = HttpServer::new(state);

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown.subscribe()).await?;
    shutdown.trigger();
    services.join().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
