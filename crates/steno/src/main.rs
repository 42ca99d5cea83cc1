//! # steno
//!
//! Recognition gateway binary. Resolves configuration, waits for the
//! engine to come up, and serves the WebSocket endpoint.

#![deny(unsafe_code)]

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use steno_relay::engine::wait_until_ready;
use steno_relay::{EngineConfig, RelayConfig};
use steno_server::{GatewayServer, ServerConfig, metrics};

const ENGINE_HOST_VAR: &str = "STENO_ENGINE_HOST";
const ENGINE_PORT_VAR: &str = "STENO_ENGINE_PORT";

/// How long to wait for open sessions after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Recognition gateway server.
#[derive(Parser, Debug)]
#[command(name = "steno", about = "WebSocket gateway for the recognition engine")]
struct Cli {
    /// Recognition engine host. Can also be set by `STENO_ENGINE_HOST`.
    #[arg(long, value_name = "HOST")]
    engine_host: Option<String>,

    /// Recognition engine port. Can also be set by `STENO_ENGINE_PORT`.
    #[arg(long, value_name = "PORT")]
    engine_port: Option<u16>,

    /// Host to bind. Set to 0.0.0.0 for external access.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "9980")]
    port: u16,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Do not wait for the engine to accept connections before serving.
    #[arg(long)]
    skip_engine_check: bool,
}

/// Engine endpoint resolution order: flag, then environment, then default.
fn resolve_engine(
    host_flag: Option<String>,
    port_flag: Option<u16>,
    host_env: Option<String>,
    port_env: Option<String>,
) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();
    if let Some(host) = host_flag.or(host_env) {
        config.host = host;
    }
    if let Some(port) = port_flag {
        config.port = port;
    } else if let Some(raw) = port_env {
        config.port = raw
            .parse()
            .with_context(|| format!("invalid {ENGINE_PORT_VAR} value: {raw}"))?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let engine = resolve_engine(
        args.engine_host,
        args.engine_port,
        std::env::var(ENGINE_HOST_VAR).ok(),
        std::env::var(ENGINE_PORT_VAR).ok(),
    )?;
    let relay = RelayConfig {
        engine,
        ..RelayConfig::default()
    };
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    };

    let metrics_handle = metrics::install_recorder();

    if args.skip_engine_check {
        info!(engine = %relay.engine.addr(), "skipping engine readiness check");
    } else {
        wait_until_ready(&relay.engine).await;
    }

    let server = GatewayServer::new(config, relay, metrics_handle);
    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    info!("gateway ready at ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("shutting down");
    server.shutdown_token().cancel();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
        warn!("open sessions did not wind down in time");
    }
    info!("shutdown complete");
    Ok(())
}
