//! Feature proxy server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                  FEATURE PROXY                   │
//!                     │                                                  │
//!   Client Request    │  ┌─────────┐   ┌────────────┐   ┌─────────────┐  │
//!   ──────────────────┼─▶│  http   │──▶│  routing   │──▶│load_balancer│  │
//!                     │  │ server  │   │DomainRouter│   │  registry   │  │
//!                     │  └─────────┘   └────────────┘   └──────┬──────┘  │
//!                     │                                        ▼         │
//!   Client Response   │                ┌────────────────────────────┐    │
//!   ◀─────────────────┼────────────────│ proxy: Upstream + transport│◀───┼── Backend
//!                     │                └────────────────────────────┘    │
//!                     │                                                  │
//!   Admin / CLI ──────┼─▶ /proxy/admin/control → Add / Remove            │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use feature_proxy::config;
use feature_proxy::lifecycle::{signals, Shutdown};
use feature_proxy::observability::{logging, metrics};
use feature_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "feature-proxy")]
#[command(about = "Subdomain-routed proxy for feature-branch preview backends", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = config::load(args.config.as_deref())?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "feature-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin_scheme = %config.origin.scheme,
        origin_port = config.origin.port,
        base_domain = %config.origin.base_domain,
        default_subdomain = %config.origin.default_subdomain,
        timeout_ms = config.upstream.timeout_ms,
        ttl_secs = config.registry.ttl_secs,
        auth = config.auth.cookie_secret.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = signals::spawn_listener(shutdown.clone());

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
