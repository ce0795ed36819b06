//! Terminal handlers and the routing table.
//!
//! # Data Flow
//! ```text
//! Router match
//!     → route gates (authenticated → activated → permission)
//!     → handler(AppState, Request, RequestContext)
//!     → Ok(json response) | Err(ApiError) rendered by the router
//! ```

pub mod entries;
pub mod health;
pub mod metrics;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;

use crate::http::middleware::{RequireActivated, RequireAuthenticated, RequirePermission};
use crate::http::server::AppState;
use crate::routing::{Route, Router};
use crate::store::PermissionStore;

pub const ENTRIES_READ: &str = "entries:read";
pub const ENTRIES_WRITE: &str = "entries:write";

/// Build the routing table for the resource API.
pub fn routes(state: AppState) -> Router {
    let permissions = state.models.permissions.clone();
    let timeout = state.config.timeouts.collaborator();
    let read = member_with(ENTRIES_READ, permissions.clone(), timeout);
    let write = member_with(ENTRIES_WRITE, permissions, timeout);

    Router::new(state)
        .route(Method::GET, "/v1/healthcheck", health::healthcheck)
        .route(Method::GET, "/debug/vars", metrics::debug_vars)
        .route(Method::POST, "/v1/users", users::register)
        .route(Method::PUT, "/v1/users/activated", users::activate)
        .route(Method::POST, "/v1/users/authentication", users::authenticate)
        .route_with(Method::GET, "/v1/entries", entries::list, &read)
        .route_with(Method::POST, "/v1/entries", entries::create, &write)
        .route_with(Method::GET, "/v1/entries/:id", entries::show, &read)
        .route_with(Method::PATCH, "/v1/entries/:id", entries::update, &write)
        .route_with(Method::DELETE, "/v1/entries/:id", entries::delete, &write)
}

/// Gates for an activated user holding `code`.
fn member_with(
    code: &'static str,
    permissions: Arc<dyn PermissionStore>,
    timeout: Duration,
) -> impl Fn(Route) -> Route {
    move |route| {
        route
            .gate(RequireAuthenticated)
            .gate(RequireActivated)
            .gate(RequirePermission::new(code, permissions.clone(), timeout))
    }
}
