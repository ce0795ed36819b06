//! Request metrics interceptor.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;

use super::{Interceptor, Next};
use crate::http::request::RequestContext;
use crate::http::response::{instrument, ResponseObservation};
use crate::observability::RequestMetrics;

/// Counts every request and response, and the time spent between them.
pub struct Metrics {
    metrics: Arc<RequestMetrics>,
}

impl Metrics {
    pub fn new(metrics: Arc<RequestMetrics>) -> Self {
        Self { metrics }
    }
}

/// Marks a request as sent when dropped. A request dropped before it
/// finished was cancelled by the drain deadline and is counted as a 503.
struct InFlight<'a> {
    metrics: &'a RequestMetrics,
    start: Instant,
    status: StatusCode,
}

impl InFlight<'_> {
    fn finish(mut self, status: StatusCode) {
        self.status = status;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.metrics.record_sent(self.status, self.start.elapsed());
    }
}

#[async_trait]
impl Interceptor for Metrics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        self.metrics.record_received();
        let in_flight = InFlight {
            metrics: self.metrics.as_ref(),
            start: Instant::now(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };

        let mut observation = ResponseObservation::default();
        let response = instrument(next.run(req, ctx).await, &mut observation);

        in_flight.finish(observation.status());
        response
    }
}
