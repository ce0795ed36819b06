//! Panic isolation.
//!
//! A panic anywhere downstream fails only the request that caused it: the
//! client gets a 500 and the connection is closed, since its state is unknown.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use futures_util::FutureExt;

use super::{Interceptor, Next};
use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::lifecycle::tasks::panic_message;

#[derive(Debug, Default, Clone, Copy)]
pub struct Recover;

#[async_trait]
impl Interceptor for Recover {
    fn name(&self) -> &'static str {
        "recover"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let environment = ctx.environment();

        match AssertUnwindSafe(next.run(req, ctx)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                tracing::error!(method = %method, path = %path, panic = %detail, "Recovered from panic in request handler");

                let mut response = ApiError::Internal(format!("panic: {detail}")).render(environment);
                response
                    .headers_mut()
                    .insert(header::CONNECTION, HeaderValue::from_static("close"));
                response
            }
        }
    }
}
