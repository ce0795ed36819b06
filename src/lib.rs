//! JSON resource server with a fixed interceptor pipeline.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod models;
pub mod notifications;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;
pub mod store;

pub use config::ServerConfig;
pub use http::{AppState, HttpServer, ShutdownReport};
pub use lifecycle::Shutdown;

/// Crate version, reported by the healthcheck and metrics endpoints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
