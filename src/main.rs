//! Single-upstream HTTP reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ axum server ──▶ context ──▶ access check ──▶ URL rewrite
//!                                              │ 403                │
//!                                              ▼                    ▼
//!   Client ◀── header/body rewrite ◀── upgrade? ◀── reqwest ──▶ Upstream (HTTPS)
//! ```
//!
//! Configuration is loaded once at startup and never changes afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use workers_proxy::config::{load_config, ProxyConfig};
use workers_proxy::lifecycle::{signals, Shutdown};
use workers_proxy::observability::{logging, metrics};
use workers_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "workers-proxy")]
#[command(about = "Reverse proxy to a single fixed upstream", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.host,
        upstream_path = %config.upstream.path,
        blocked_regions = config.access.blocked_regions.len(),
        blocked_ips = config.access.blocked_ips.len(),
        "Configuration loaded"
    );
    if !config.upstream.path.is_empty() && !config.upstream.path.ends_with('/') {
        tracing::warn!(
            upstream_path = %config.upstream.path,
            "Upstream path does not end with '/'; it is concatenated with the request path as-is"
        );
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
