//! The interceptor chain.
//!
//! # Data Flow
//! ```text
//! Chain::handle(request)
//!     → metrics → recover → cors → rate_limit (optional) → authenticate
//!     → Router (an Endpoint)
//!         → route gates: require authenticated / activated / permission
//!         → terminal handler
//! ```
//!
//! # Design Decisions
//! - Each stage implements one capability: `process(request, ctx, next)`
//! - A stage short-circuits by returning a response without calling `next`
//! - The chain is built once at startup and never changes
//! - Stages are tested in isolation against a stub endpoint

pub mod access_control;
pub mod authenticate;
pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod recover;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{ConnectInfo, Request};
use axum::response::Response;

use crate::config::Environment;
use crate::http::request::RequestContext;

pub use access_control::{RequireActivated, RequireAuthenticated, RequirePermission};
pub use authenticate::Authenticate;
pub use cors::Cors;
pub use self::metrics::Metrics;
pub use rate_limit::RateLimit;
pub use recover::Recover;

/// One stage of cross-cutting request processing.
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response;
}

/// Whatever sits after the last stage.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, req: Request, ctx: &mut RequestContext) -> Response;
}

/// The remainder of a chain, handed to each stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Interceptor>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Interceptor>], endpoint: &'a dyn Endpoint) -> Self {
        Self { stages, endpoint }
    }

    pub async fn run(self, req: Request, ctx: &mut RequestContext) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                stage.process(req, ctx, next).await
            }
            None => self.endpoint.call(req, ctx).await,
        }
    }
}

/// An ordered, immutable list of stages in front of an endpoint.
pub struct Chain {
    stages: Vec<Arc<dyn Interceptor>>,
    endpoint: Arc<dyn Endpoint>,
    environment: Environment,
}

impl Chain {
    pub fn new(endpoint: Arc<dyn Endpoint>, environment: Environment) -> Self {
        Self {
            stages: Vec::new(),
            endpoint,
            environment,
        }
    }

    /// Append a stage; stages run in the order they are added.
    pub fn stage(mut self, stage: impl Interceptor + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run one request through every stage.
    pub async fn handle(&self, req: Request) -> Response {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let mut ctx = RequestContext::new(peer, self.environment);
        Next::new(&self.stages, self.endpoint.as_ref())
            .run(req, &mut ctx)
            .await
    }
}
