//! Rate limiting interceptor.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

use super::{Interceptor, Next};
use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::observability::metrics as telemetry;
use crate::security::{client_key, RateLimiter};

/// Rejects a client with 429 once its bucket is empty.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Interceptor for RateLimit {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        let key = client_key(req.headers(), ctx.peer());
        if self.limiter.admit(&key) {
            return next.run(req, ctx).await;
        }

        tracing::warn!(client = %key, "Rate limit exceeded");
        telemetry::record_rate_limited();
        ApiError::RateLimited.render(ctx.environment())
    }
}
