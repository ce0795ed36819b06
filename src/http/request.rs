//! Per-request scoped context.
//!
//! # Responsibilities
//! - Carry the peer address and deployment environment into every stage
//! - Hold the identity attached by authentication
//! - Expose path parameters captured by the router
//!
//! # Design Decisions
//! - Passed explicitly as `&mut RequestContext` through the chain; no ambient storage
//! - Reading the identity before authentication ran is a programming error and panics

use std::net::SocketAddr;

use crate::config::Environment;
use crate::http::error::ApiError;
use crate::models::Identity;

/// Values scoped to a single request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    peer: Option<SocketAddr>,
    environment: Environment,
    identity: Option<Identity>,
    params: PathParams,
}

impl RequestContext {
    pub fn new(peer: Option<SocketAddr>, environment: Environment) -> Self {
        Self {
            peer,
            environment,
            identity: None,
            params: PathParams::default(),
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Attach the caller's identity. Called once, by authentication.
    pub fn set_identity(&mut self, identity: Identity) {
        debug_assert!(self.identity.is_none(), "identity attached twice");
        self.identity = Some(identity);
    }

    /// The identity attached by authentication.
    ///
    /// # Panics
    ///
    /// If authentication has not run for this request.
    pub fn identity(&self) -> &Identity {
        match &self.identity {
            Some(identity) => identity,
            None => panic!("missing identity in request context"),
        }
    }

    pub fn try_identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }
}

/// Named segments captured from the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The positive integer `:id` parameter; anything else is "not found".
    pub fn id(&self) -> Result<i64, ApiError> {
        self.get("id")
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or(ApiError::NotFound)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
