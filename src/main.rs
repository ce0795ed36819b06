//! resource-server
//!
//! Serves a small JSON API behind a fixed request pipeline:
//!
//! ```text
//!     request → metrics → recover → cors → rate limit → authenticate
//!             → router → route gates → handler → response
//! ```
//!
//! Runs until SIGINT or SIGTERM, then drains in-flight requests and
//! background tasks before exiting.

use std::path::PathBuf;

use clap::Parser;

use resource_server::config::{load_config, Environment, ServerConfig};
use resource_server::lifecycle::{signals, startup, Shutdown};
use resource_server::observability::init_logging;
use resource_server::store::Models;
use resource_server::VERSION;

#[derive(Debug, Parser)]
#[command(name = "resource-server", version, about = "JSON resource server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the environment (development|staging|production).
    #[arg(short, long)]
    env: Option<Environment>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.set_port(port);
    }
    if let Some(env) = cli.env {
        config.environment = env;
    }

    init_logging(&config.observability)?;
    tracing::info!(version = VERSION, environment = %config.environment, "resource-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.enabled,
        cors = ?config.cors.mode,
        "Configuration loaded"
    );

    let prepared = startup::prepare(config, Models::in_memory())
        .await
        .inspect_err(|err| tracing::error!(error = %err, "Startup failed"))?;

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(signals::shutdown_on_signal(shutdown));

    let report = prepared.server.run(prepared.listener, stop).await?;
    tracing::info!(
        clean = report.is_clean(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Shutdown complete"
    );
    Ok(())
}
