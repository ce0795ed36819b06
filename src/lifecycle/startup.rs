//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Install the optional Prometheus exporter
//! - Bind the listener and assemble the server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, after everything else succeeded

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{validate_config, ConfigError, ServerConfig};
use crate::http::server::{AppState, HttpServer};
use crate::observability::metrics::init_metrics;
use crate::store::Models;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid prometheus address {0:?}")]
    PrometheusAddress(String),

    #[error("failed to install prometheus exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// A server ready to run, with its bound listener.
pub struct Prepared {
    pub server: HttpServer,
    pub listener: TcpListener,
    pub local_addr: SocketAddr,
}

/// Validate `config`, then build the server and bind its listener.
pub async fn prepare(config: ServerConfig, models: Models) -> Result<Prepared, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    if let Some(address) = &config.observability.prometheus_address {
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| StartupError::PrometheusAddress(address.clone()))?;
        init_metrics(addr)?;
        tracing::info!(address = %addr, "Prometheus exporter listening");
    }

    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: config.listener.bind_address.clone(),
        source,
    })?;

    let server = HttpServer::new(AppState::new(config, models));
    Ok(Prepared {
        server,
        listener,
        local_addr,
    })
}
