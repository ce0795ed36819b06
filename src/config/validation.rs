//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, deadlines > 0, addresses parse)
//! - Detect an allow-list CORS policy with nothing on the list
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{CorsMode, ServerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    BindAddress(String),

    #[error("observability.prometheus_address {0:?} is not a valid socket address")]
    PrometheusAddress(String),

    #[error("rate_limit.requests_per_second must be a positive number")]
    RequestsPerSecond,

    #[error("rate_limit.burst_size must be at least 1")]
    BurstSize,

    #[error("rate_limit.idle_timeout_secs must not be shorter than sweep_interval_secs")]
    IdleTimeout,

    #[error("rate_limit.sweep_interval_secs must be greater than zero")]
    SweepInterval,

    #[error("cors.trusted_origins must not be empty in allow-list mode")]
    EmptyAllowList,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("security.password_cost must be between 4 and 31")]
    PasswordCost,

    #[error("security.max_body_bytes must be greater than zero")]
    MaxBodyBytes,
}

/// Check every semantic constraint, collecting all violations.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Some(addr) = &config.observability.prometheus_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::PrometheusAddress(addr.clone()));
        }
    }

    let limits = &config.rate_limit;
    if limits.enabled {
        if !(limits.requests_per_second.is_finite() && limits.requests_per_second > 0.0) {
            errors.push(ValidationError::RequestsPerSecond);
        }
        if limits.burst_size == 0 {
            errors.push(ValidationError::BurstSize);
        }
        if limits.sweep_interval_secs == 0 {
            errors.push(ValidationError::SweepInterval);
        } else if limits.idle_timeout_secs < limits.sweep_interval_secs {
            errors.push(ValidationError::IdleTimeout);
        }
    }

    if config.cors.mode == CorsMode::AllowList && config.cors.trusted_origins.is_empty() {
        errors.push(ValidationError::EmptyAllowList);
    }

    if config.timeouts.collaborator_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("collaborator_ms"));
    }
    if config.timeouts.shutdown_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("shutdown_ms"));
    }

    if !(4..=31).contains(&config.security.password_cost) {
        errors.push(ValidationError::PasswordCost);
    }
    if config.security.max_body_bytes == 0 {
        errors.push(ValidationError::MaxBodyBytes);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rate_limit.burst_size = 0;
        config.cors.trusted_origins.clear();
        config.timeouts.shutdown_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::BindAddress("not-an-address".into()),
                ValidationError::BurstSize,
                ValidationError::EmptyAllowList,
                ValidationError::ZeroTimeout("shutdown_ms"),
            ]
        );
    }

    #[test]
    fn test_disabled_limiter_skips_rate_checks() {
        let mut config = ServerConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.requests_per_second = 0.0;
        assert!(validate_config(&config).is_ok());
    }
}
