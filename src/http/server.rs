//! HTTP server setup and lifecycle.
//!
//! # Responsibilities
//! - Hold the shared application state handed to every handler
//! - Compose the fixed interceptor chain in front of the router
//! - Mount the chain on axum with request-id and trace layers
//! - Serve until shutdown, then drain in-flight requests and background tasks
//!
//! # Design Decisions
//! - axum is only the transport; the chain is its single fallback
//! - One drain deadline covers connections and background tasks
//! - Overrunning the deadline is a warning in the report, never a crash

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::{self, Instant};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::ServerConfig;
use crate::http::json::json_response;
use crate::http::middleware::{Authenticate, Chain, Cors, Metrics, RateLimit, Recover};
use crate::lifecycle::state::{Lifecycle, LifecycleState};
use crate::lifecycle::tasks::{DrainOutcome, TaskTracker};
use crate::notifications::{LogNotifier, Notifier};
use crate::observability::RequestMetrics;
use crate::routing::Router;
use crate::security::RateLimiter;
use crate::store::Models;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub models: Models,
    pub metrics: Arc<RequestMetrics>,
    pub tasks: TaskTracker,
    pub notifier: Arc<dyn Notifier>,
    pub lifecycle: Arc<Lifecycle>,
}

impl AppState {
    pub fn new(config: ServerConfig, models: Models) -> Self {
        Self {
            config: Arc::new(config),
            models,
            metrics: Arc::new(RequestMetrics::new()),
            tasks: TaskTracker::new(),
            notifier: Arc::new(LogNotifier),
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(ServerConfig::default(), Models::in_memory())
    }
}

/// Build the fixed chain: metrics, recover, cors, rate limit (if any), authenticate, router.
pub fn build_pipeline(router: Router, limiter: Option<Arc<RateLimiter>>) -> Chain {
    let state = router.state().clone();
    let config = &state.config;

    let mut chain = Chain::new(Arc::new(router), config.environment)
        .stage(Metrics::new(state.metrics.clone()))
        .stage(Recover)
        .stage(Cors::new(&config.cors));
    if let Some(limiter) = limiter {
        chain = chain.stage(RateLimit::new(limiter));
    }
    chain.stage(Authenticate::new(
        state.models.users.clone(),
        config.timeouts.collaborator(),
    ))
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Task(String),

    #[error("server stopped before shutdown was requested")]
    UnexpectedStop,
}

/// How in-flight connections ended during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDrain {
    /// Every connection finished before the deadline.
    Completed,
    /// The deadline passed; requests still running were cancelled.
    Aborted,
}

/// Outcome of a graceful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub connections: ConnectionDrain,
    pub background_tasks: DrainOutcome,
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Whether everything finished inside the deadline.
    pub fn is_clean(&self) -> bool {
        self.connections == ConnectionDrain::Completed && self.background_tasks == DrainOutcome::Drained
    }
}

/// HTTP server for the resource API.
pub struct HttpServer {
    state: AppState,
    chain: Arc<Chain>,
    limiter: Option<Arc<RateLimiter>>,
}

impl HttpServer {
    /// Create a server with the standard routes.
    pub fn new(state: AppState) -> Self {
        Self::with_router(api::routes(state))
    }

    /// Create a server around a custom routing table.
    pub fn with_router(router: Router) -> Self {
        let state = router.state().clone();
        let limiter = state
            .config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(&state.config.rate_limit)));
        let chain = Arc::new(build_pipeline(router, limiter.clone()));

        Self {
            state,
            chain,
            limiter,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the axum app: the chain as fallback, wrapped in transport layers.
    ///
    /// Every request races `hard_stop`; once it fires, unfinished requests
    /// are dropped and answered with 503.
    fn app(&self, hard_stop: watch::Receiver<bool>) -> axum::Router {
        let chain = self.chain.clone();
        axum::Router::new()
            .fallback(move |req: Request| {
                let chain = chain.clone();
                let hard_stop = hard_stop.clone();
                async move {
                    tokio::select! {
                        response = chain.handle(req) => response,
                        () = stopped(hard_stop) => cancelled_response(),
                    }
                }
            })
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Serve on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ShutdownReport, ServerError> {
        let addr = listener.local_addr()?;
        let state = self.state.clone();
        let grace = state.config.timeouts.shutdown();

        if let Some(limiter) = &self.limiter {
            tokio::spawn(
                limiter
                    .clone()
                    .run_sweeper(state.config.rate_limit.sweep_interval(), shutdown.resubscribe()),
            );
        }

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (hard_stop_tx, hard_stop_rx) = watch::channel(false);
        let app = self
            .app(hard_stop_rx)
            .into_make_service_with_connect_info::<SocketAddr>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        state.lifecycle.advance(LifecycleState::Accepting);
        tracing::info!(
            address = %addr,
            environment = %state.config.environment,
            stages = ?self.chain.stage_names(),
            "HTTP server accepting connections"
        );

        tokio::select! {
            _ = shutdown.recv() => {}
            result = &mut server => {
                state.lifecycle.advance(LifecycleState::Stopped);
                return Err(match result {
                    Ok(Ok(())) => ServerError::UnexpectedStop,
                    Ok(Err(err)) => ServerError::Io(err),
                    Err(err) => ServerError::Task(err.to_string()),
                });
            }
        }

        let started = Instant::now();
        let deadline = started + grace;
        state.lifecycle.advance(LifecycleState::Draining);
        tracing::info!(
            grace_ms = grace.as_millis() as u64,
            active_requests = state.metrics.active(),
            background_tasks = state.tasks.outstanding(),
            "Draining in-flight work"
        );
        let _ = stop_tx.send(());

        let connections = match time::timeout_at(deadline, &mut server).await {
            Ok(Ok(Ok(()))) => ConnectionDrain::Completed,
            Ok(Ok(Err(err))) => {
                tracing::error!(error = %err, "Server error while draining connections");
                ConnectionDrain::Completed
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Server task failed while draining connections");
                ConnectionDrain::Completed
            }
            Err(_) => {
                tracing::warn!(
                    active_requests = state.metrics.active(),
                    "In-flight requests still running at drain deadline, cancelling them"
                );
                let _ = hard_stop_tx.send(true);
                server.abort();
                ConnectionDrain::Aborted
            }
        };

        let background_tasks = state.tasks.drain(deadline).await;
        match background_tasks {
            DrainOutcome::Drained => tracing::info!("Background tasks completed"),
            DrainOutcome::TimedOut { outstanding } => {
                tracing::warn!(outstanding, "Background tasks still running at drain deadline")
            }
        }

        state.lifecycle.advance(LifecycleState::Stopped);
        let report = ShutdownReport {
            connections,
            background_tasks,
            elapsed: started.elapsed(),
        };
        tracing::info!(clean = report.is_clean(), elapsed_ms = report.elapsed.as_millis() as u64, "HTTP server stopped");
        Ok(report)
    }
}

async fn stopped(mut hard_stop: watch::Receiver<bool>) {
    let _ = hard_stop.wait_for(|stop| *stop).await;
}

fn cancelled_response() -> Response {
    let mut response = json_response(
        StatusCode::SERVICE_UNAVAILABLE,
        &json!({ "error": "the server is shutting down" }),
    );
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
