//! Authorization gates.
//!
//! Attached per route, after authentication has run. Gates compose by
//! conjunction in declared order; the first failing gate answers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

use super::{Interceptor, Next};
use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::models::Identity;
use crate::resilience::call_with_deadline;
use crate::store::PermissionStore;

/// Anonymous callers get 401.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequireAuthenticated;

#[async_trait]
impl Interceptor for RequireAuthenticated {
    fn name(&self) -> &'static str {
        "require_authenticated"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        if ctx.identity().is_anonymous() {
            return ApiError::AuthenticationRequired.render(ctx.environment());
        }
        next.run(req, ctx).await
    }
}

/// Callers whose account is not activated get 403.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequireActivated;

#[async_trait]
impl Interceptor for RequireActivated {
    fn name(&self) -> &'static str {
        "require_activated"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        let identity = ctx.identity();
        if identity.is_anonymous() {
            return ApiError::AuthenticationRequired.render(ctx.environment());
        }
        if !identity.is_activated() {
            return ApiError::InactiveUser.render(ctx.environment());
        }
        next.run(req, ctx).await
    }
}

/// Callers lacking permission `code` get 403.
pub struct RequirePermission {
    code: &'static str,
    permissions: Arc<dyn PermissionStore>,
    timeout: Duration,
}

impl RequirePermission {
    pub fn new(code: &'static str, permissions: Arc<dyn PermissionStore>, timeout: Duration) -> Self {
        Self {
            code,
            permissions,
            timeout,
        }
    }

    async fn check(&self, identity: &Identity) -> Result<(), ApiError> {
        let Some(user) = identity.user() else {
            return Err(ApiError::NotPermitted);
        };
        let granted = call_with_deadline(self.timeout, self.permissions.get_all_for_user(user.id)).await?;
        if granted.include(self.code) {
            Ok(())
        } else {
            Err(ApiError::NotPermitted)
        }
    }
}

#[async_trait]
impl Interceptor for RequirePermission {
    fn name(&self) -> &'static str {
        "require_permission"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        let verdict = self.check(ctx.identity()).await;
        match verdict {
            Ok(()) => next.run(req, ctx).await,
            Err(err) => err.render(ctx.environment()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::Endpoint;
    use super::*;
    use crate::models::{Permissions, User};
    use crate::store::{MemoryStore, StoreError};
    use axum::body::Body;
    use axum::http::StatusCode;

    struct BrokenPermissions;

    #[async_trait]
    impl PermissionStore for BrokenPermissions {
        async fn get_all_for_user(&self, _user_id: i64) -> Result<Permissions, StoreError> {
            Err(StoreError::Backend("timeout talking to db".into()))
        }
        async fn add_for_user(&self, _user_id: i64, _codes: &[&str]) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn user(activated: bool) -> Identity {
        Identity::User(Arc::new(User {
            id: 7,
            created_at: 0,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            activated,
        }))
    }

    async fn gated(stages: Vec<Arc<dyn Interceptor>>, identity: Identity, endpoint: &dyn Endpoint) -> StatusCode {
        let mut ctx = ctx();
        ctx.set_identity(identity);
        Next::new(&stages, endpoint)
            .run(Request::new(Body::empty()), &mut ctx)
            .await
            .status()
    }

    fn full_gates(store: Arc<dyn PermissionStore>) -> Vec<Arc<dyn Interceptor>> {
        let permission = RequirePermission::new("entries:read", store, Duration::from_secs(3));
        vec![
            Arc::new(RequireAuthenticated) as Arc<dyn Interceptor>,
            Arc::new(RequireActivated),
            Arc::new(permission),
        ]
    }

    #[tokio::test]
    async fn test_anonymous_is_401() {
        let endpoint = StubEndpoint::default();
        let stages = full_gates(Arc::new(MemoryStore::new()));
        assert_eq!(gated(stages, Identity::Anonymous, &endpoint).await, StatusCode::UNAUTHORIZED);
        assert_eq!(endpoint.calls(), 0);
    }

    #[tokio::test]
    async fn test_inactive_is_403() {
        let endpoint = StubEndpoint::default();
        let stages = full_gates(Arc::new(MemoryStore::new()));
        assert_eq!(gated(stages, user(false), &endpoint).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_permission_is_403() {
        let endpoint = StubEndpoint::default();
        let store = Arc::new(MemoryStore::new());
        store.add_for_user(7, &["entries:write"]).await.unwrap();
        let stages = full_gates(store);
        assert_eq!(gated(stages, user(true), &endpoint).await, StatusCode::FORBIDDEN);
        assert_eq!(endpoint.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_conditions_met_reaches_handler() {
        let endpoint = StubEndpoint::default();
        let store = Arc::new(MemoryStore::new());
        store.add_for_user(7, &["entries:read"]).await.unwrap();
        let stages = full_gates(store);
        assert_eq!(gated(stages, user(true), &endpoint).await, StatusCode::OK);
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_permission_lookup_failure_is_500() {
        let endpoint = StubEndpoint::default();
        let gate = RequirePermission::new("entries:read", Arc::new(BrokenPermissions), Duration::from_secs(3));
        let stages: Vec<Arc<dyn Interceptor>> = vec![Arc::new(gate)];
        assert_eq!(gated(stages, user(true), &endpoint).await, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_activation_gate_alone_rejects_anonymous() {
        let endpoint = StubEndpoint::default();
        let stages: Vec<Arc<dyn Interceptor>> = vec![Arc::new(RequireActivated)];
        assert_eq!(gated(stages, Identity::Anonymous, &endpoint).await, StatusCode::UNAUTHORIZED);
    }
}
