//! The JSON metrics endpoint.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::json::json_response;
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::lifecycle::LifecycleState;
use crate::models::token::unix_now;
use crate::observability::MetricsSnapshot;
use crate::store::StoreSnapshot;

#[derive(Serialize)]
pub struct DebugVars {
    pub version: &'static str,
    pub timestamp: u64,
    pub uptime_secs: u64,
    pub lifecycle: LifecycleState,
    /// Tasks alive on the runtime, request handlers included.
    pub tasks: usize,
    pub background_tasks: usize,
    pub database: StoreSnapshot,
    #[serde(flatten)]
    pub requests: MetricsSnapshot,
}

/// Serve the counters; resets "requests between metrics calls".
pub async fn debug_vars(state: AppState, _req: Request, _ctx: RequestContext) -> Result<Response, ApiError> {
    let between = state.metrics.take_between_metrics_calls();
    let mut requests = state.metrics.snapshot();
    requests.requests_between_metrics_calls = between;

    let vars = DebugVars {
        version: crate::VERSION,
        timestamp: unix_now(),
        uptime_secs: state.metrics.uptime().as_secs(),
        lifecycle: state.lifecycle.current(),
        tasks: tokio::runtime::Handle::current().metrics().num_alive_tasks(),
        background_tasks: state.tasks.outstanding(),
        database: state.models.status.snapshot(),
        requests,
    };
    Ok(json_response(StatusCode::OK, &vars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::testing::ctx;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn vars(state: AppState) -> Value {
        let response = debug_vars(state, Request::new(Body::empty()), ctx()).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_reports_live_runtime_tasks() {
        let pending: Vec<_> = (0..50)
            .map(|_| tokio::spawn(std::future::pending::<()>()))
            .collect();

        let vars = vars(AppState::for_tests()).await;
        assert!(vars["tasks"].as_u64().unwrap() >= 50);

        for handle in pending {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn test_between_calls_counter_resets() {
        let state = AppState::for_tests();
        state.metrics.record_received();
        state.metrics.record_received();

        assert_eq!(vars(state.clone()).await["requests_between_metrics_calls"], 2);
        assert_eq!(vars(state).await["requests_between_metrics_calls"], 0);
    }
}
