use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::json::json_response;
use crate::http::request::RequestContext;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemInfo {
    pub environment: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub system_info: SystemInfo,
}

pub async fn healthcheck(state: AppState, _req: Request, _ctx: RequestContext) -> Result<Response, ApiError> {
    Ok(json_response(
        StatusCode::OK,
        &Health {
            status: "available",
            system_info: SystemInfo {
                environment: state.config.environment.as_str(),
                version: crate::VERSION,
            },
        },
    ))
}
