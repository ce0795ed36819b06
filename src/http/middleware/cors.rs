//! Cross-origin headers and preflight handling.
//!
//! The server never rejects a request over CORS; browsers enforce it. This
//! stage only decides which headers go on the response.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;

use super::{Interceptor, Next};
use crate::config::{CorsConfig, CorsMode};
use crate::http::request::RequestContext;

const ALLOWED_METHODS: &str = "OPTIONS, PUT, PATCH, DELETE";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type";

pub struct Cors {
    mode: CorsMode,
    trusted_origins: Vec<String>,
}

impl Cors {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            mode: config.mode,
            trusted_origins: config.trusted_origins.clone(),
        }
    }

    /// The `Access-Control-Allow-Origin` value for a request, if any.
    fn allow_origin(&self, headers: &HeaderMap) -> Option<HeaderValue> {
        match self.mode {
            CorsMode::All => Some(HeaderValue::from_static("*")),
            CorsMode::AllowList => {
                let origin = headers.get(header::ORIGIN)?;
                let trusted = self
                    .trusted_origins
                    .iter()
                    .any(|t| t.as_bytes() == origin.as_bytes());
                trusted.then(|| origin.clone())
            }
        }
    }
}

fn is_preflight(req: &Request) -> bool {
    req.method() == Method::OPTIONS && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

#[async_trait]
impl Interceptor for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        let allow_origin = self.allow_origin(req.headers());

        let mut response = if allow_origin.is_some() && is_preflight(&req) {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::OK;
            let headers = response.headers_mut();
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOWED_HEADERS),
            );
            response
        } else {
            next.run(req, ctx).await
        };

        let headers = response.headers_mut();
        if self.mode == CorsMode::AllowList {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.append(header::VARY, HeaderValue::from_static("Access-Control-Request-Method"));
        if let Some(origin) = allow_origin {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        response
    }
}
