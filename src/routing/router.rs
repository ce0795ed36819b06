//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store routes in table order
//! - Dispatch method + path to the first full match
//! - Answer 404 for unknown paths, 405 (with `Allow`) for unknown methods
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan; route tables are small
//! - Handlers are type-erased behind one `Arc<dyn Endpoint>` each

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::Method;
use axum::response::Response;

use super::matcher::PathPattern;
use crate::http::error::ApiError;
use crate::http::middleware::{Endpoint, Interceptor, Next};
use crate::http::request::RequestContext;
use crate::http::server::AppState;

/// Boxed future returned by every handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send + 'static>>;

/// A terminal handler: any `async fn(AppState, Request, RequestContext) -> Result<Response, ApiError>`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, state: AppState, req: Request, ctx: RequestContext) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(AppState, Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, ApiError>> + Send + 'static,
{
    fn call(&self, state: AppState, req: Request, ctx: RequestContext) -> HandlerFuture {
        Box::pin((self)(state, req, ctx))
    }
}

/// Bridges a [`Handler`] and its state into an [`Endpoint`].
struct TerminalHandler {
    handler: Box<dyn Handler>,
    state: AppState,
}

#[async_trait]
impl Endpoint for TerminalHandler {
    async fn call(&self, req: Request, ctx: &mut RequestContext) -> Response {
        let environment = ctx.environment();
        match self.handler.call(self.state.clone(), req, ctx.clone()).await {
            Ok(response) => response,
            Err(err) => err.render(environment),
        }
    }
}

/// One row of the routing table.
pub struct Route {
    method: Method,
    pattern: PathPattern,
    gates: Vec<Arc<dyn Interceptor>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Route {
    pub fn new(method: Method, pattern: &str, endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            method,
            pattern: PathPattern::parse(pattern),
            gates: Vec::new(),
            endpoint,
        }
    }

    /// Guard this route with `gate`; gates run in the order added.
    pub fn gate(mut self, gate: impl Interceptor + 'static) -> Self {
        self.gates.push(Arc::new(gate));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

/// The routing table, used as the chain's endpoint.
pub struct Router {
    state: AppState,
    routes: Vec<Route>,
}

impl Router {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            routes: Vec::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Add a route served by `handler`.
    pub fn route<H: Handler>(self, method: Method, pattern: &str, handler: H) -> Self {
        self.route_with(method, pattern, handler, |route| route)
    }

    /// Add a route served by `handler`, letting `configure` attach gates.
    pub fn route_with<H, C>(mut self, method: Method, pattern: &str, handler: H, configure: C) -> Self
    where
        H: Handler,
        C: FnOnce(Route) -> Route,
    {
        let endpoint = Arc::new(TerminalHandler {
            handler: Box::new(handler),
            state: self.state.clone(),
        });
        self.routes.push(configure(Route::new(method, pattern, endpoint)));
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[async_trait]
impl Endpoint for Router {
    async fn call(&self, req: Request, ctx: &mut RequestContext) -> Response {
        let path = req.uri().path().to_string();
        let mut allowed = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(&path) else {
                continue;
            };
            if route.method == req.method() {
                ctx.set_params(params);
                return Next::new(&route.gates, route.endpoint.as_ref())
                    .run(req, ctx)
                    .await;
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        let err = if allowed.is_empty() {
            ApiError::NotFound
        } else {
            ApiError::MethodNotAllowed {
                method: req.method().clone(),
                allowed,
            }
        };
        err.render(ctx.environment())
    }
}
