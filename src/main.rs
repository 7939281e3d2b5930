//! SolarLink application server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ ┌──────────┐   ┌───────────────────┐   ┌──────────┐
//!                     │  trace   │──▶│ observe middleware │──▶│ handlers │
//!                     │  layer   │   │ request id, logger │   │ /health  │
//!                     └──────────┘   └─────────┬─────────┘   │ /metrics │
//!                                              │             │ /events  │
//!                                              ▼             └──────────┘
//!                                     ┌──────────────────┐
//!                                     │ MetricsRecorder  │◀── GET /metrics
//!                                     └──────────────────┘
//!     stdout ◀── StructuredLogger (JSON lines)
//!     stderr ◀── tracing diagnostics
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use solarlink_server::config::load_config;
use solarlink_server::lifecycle::{signals, uptime, Shutdown};
use solarlink_server::observability::{metrics, tracing::init_tracing, StdoutSink, StructuredLogger};
use solarlink_server::HttpServer;

#[derive(Parser)]
#[command(name = "solarlink")]
#[command(about = "SolarLink application server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    uptime::mark_process_start();
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    let logger = StructuredLogger::from_config(&config.observability, Arc::new(StdoutSink));
    let recorder = metrics::init_metrics(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        log_level = %logger.level(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listener.bind_address))?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, logger, recorder);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result.context("server task panicked")??;
            return Ok(());
        }
        _ = signals::wait_for_shutdown_signal() => {}
    }

    shutdown.trigger();
    server_task.await.context("server task panicked")??;

    tracing::info!("Shutdown complete");
    Ok(())
}
