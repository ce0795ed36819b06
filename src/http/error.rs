//! The external error taxonomy and its `{"error": ...}` envelope.

use std::collections::BTreeMap;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::Response;
use serde_json::json;
use thiserror::Error;

use super::decode::DecodeError;
use super::json::json_response;
use crate::config::Environment;
use crate::store::StoreError;

/// Generic text for every server-side failure.
pub const SERVER_ERROR_MESSAGE: &str = "the server encountered a problem and could not process your request";

/// Who caused a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 4xx. Always shown to the caller, never logged as a fault.
    Client,
    /// 5xx. Logged in full, shown to the caller as a generic message.
    Server,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("your user account must be activated to access this resource")]
    InactiveUser,

    #[error("your user account doesn't have the necessary permissions to access this resource")]
    NotPermitted,

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {method} method is not supported for this resource")]
    MethodNotAllowed { method: Method, allowed: Vec<Method> },

    #[error("failed validation")]
    FailedValidation(BTreeMap<String, String>),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidAuthenticationToken
            | ApiError::AuthenticationRequired
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InactiveUser | ApiError::NotPermitted => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn class(&self) -> ErrorClass {
        if self.status().is_server_error() {
            ErrorClass::Server
        } else {
            ErrorClass::Client
        }
    }

    pub fn validation(field: &str, message: &str) -> Self {
        ApiError::FailedValidation(BTreeMap::from([(field.to_string(), message.to_string())]))
    }

    /// Render the error envelope. Server errors are logged here.
    pub fn render(self, environment: Environment) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::FailedValidation(fields) => json!({ "error": fields }),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                if environment.exposes_internal_errors() {
                    json!({ "error": SERVER_ERROR_MESSAGE, "detail": detail })
                } else {
                    json!({ "error": SERVER_ERROR_MESSAGE })
                }
            }
            other => json!({ "error": other.to_string() }),
        };

        let mut response = json_response(status, &body);
        let headers = response.headers_mut();
        match &self {
            ApiError::InvalidAuthenticationToken => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            ApiError::MethodNotAllowed { allowed, .. } => {
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    headers.insert(header::ALLOW, value);
                }
            }
            _ => {}
        }
        response
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Other(detail) => ApiError::Internal(format!("decoding request body: {detail}")),
            client => ApiError::BadRequest(client.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::DuplicateEmail => {
                ApiError::validation("email", "a user with this email address already exists")
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
