//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the resource server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deployment environment.
    pub environment: Environment,

    /// Per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Collaborator and shutdown deadlines.
    pub timeouts: TimeoutConfig,

    /// Body limits, password hashing and token lifetimes.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Replace the port of the bind address, keeping the host part.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        self.bind_address = format!("{host}:{port}");
    }
}

/// Deployment environment. Only `Development` exposes internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Whether internal error detail may be echoed to clients.
    pub fn exposes_internal_errors(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment {other:?} (expected development|staging|production)"
            )),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client.
    pub requests_per_second: f64,

    /// Burst capacity (bucket size).
    pub burst_size: u32,

    /// How often idle clients are swept, in seconds.
    pub sweep_interval_secs: u64,

    /// Clients not seen for this long are evicted, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst_size: 4,
            sweep_interval_secs: 60,
            idle_timeout_secs: 180,
        }
    }
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// How the `Access-Control-Allow-Origin` header is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CorsMode {
    /// `Access-Control-Allow-Origin: *` for every request.
    All,
    /// Echo the request origin only when it is trusted.
    #[default]
    AllowList,
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub mode: CorsMode,

    /// Trusted origins for `allow-list` mode.
    pub trusted_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            mode: CorsMode::AllowList,
            trusted_origins: vec![
                "https://www.example.com".to_string(),
                "https://www.example.org".to_string(),
            ],
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for each call into an external collaborator, in milliseconds.
    pub collaborator_ms: u64,

    /// Deadline for draining in-flight work on shutdown, in milliseconds.
    pub shutdown_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            collaborator_ms: 3_000,
            shutdown_ms: 20_000,
        }
    }
}

impl TimeoutConfig {
    pub fn collaborator(&self) -> Duration {
        Duration::from_millis(self.collaborator_ms)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_millis(self.shutdown_ms)
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum JSON request body size in bytes.
    pub max_body_bytes: usize,

    /// bcrypt cost for password hashes.
    pub password_cost: u32,

    /// Lifetime of activation tokens in seconds.
    pub activation_token_ttl_secs: u64,

    /// Lifetime of authentication tokens in seconds.
    pub authentication_token_ttl_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1_048_576, // 1MB
            password_cost: 12,
            activation_token_ttl_secs: 3 * 24 * 60 * 60,
            authentication_token_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus scrape endpoint bind address. Disabled when unset.
    pub prometheus_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            prometheus_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.timeouts.collaborator(), Duration::from_secs(3));
        assert_eq!(config.timeouts.shutdown(), Duration::from_secs(20));
        assert_eq!(config.rate_limit.idle_timeout(), 3 * config.rate_limit.sweep_interval());
        assert_eq!(config.security.max_body_bytes, 1_048_576);
    }

    #[test]
    fn test_partial_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            environment = "production"

            [rate_limit]
            requests_per_second = 10.0

            [cors]
            mode = "all"
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.rate_limit.requests_per_second, 10.0);
        assert_eq!(config.rate_limit.burst_size, 4);
        assert_eq!(config.cors.mode, CorsMode::All);
        assert!(!config.environment.exposes_internal_errors());
    }

    #[test]
    fn test_set_port() {
        let mut listener = ListenerConfig::default();
        listener.set_port(8088);
        assert_eq!(listener.bind_address, "0.0.0.0:8088");
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("Staging".parse::<Environment>().unwrap(), Environment::Staging);
        assert!("qa".parse::<Environment>().is_err());
    }
}
