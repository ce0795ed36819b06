//! Bearer token authentication.
//!
//! Every request leaves this stage with an identity attached: anonymous when
//! no `Authorization` header was sent, otherwise the token's owner. A header
//! that is present but unusable ends the request with 401.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;

use super::{Interceptor, Next};
use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::models::token::is_well_formed;
use crate::models::{Identity, TokenHash, TokenScope};
use crate::resilience::call_with_deadline;
use crate::store::{StoreError, UserStore};

pub struct Authenticate {
    users: Arc<dyn UserStore>,
    timeout: Duration,
}

impl Authenticate {
    pub fn new(users: Arc<dyn UserStore>, timeout: Duration) -> Self {
        Self { users, timeout }
    }

    async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(Identity::Anonymous);
        };
        let value = value
            .to_str()
            .map_err(|_| ApiError::InvalidAuthenticationToken)?;

        let token = match value.split(' ').collect::<Vec<_>>().as_slice() {
            ["Bearer", token] => *token,
            _ => return Err(ApiError::InvalidAuthenticationToken),
        };
        if !is_well_formed(token) {
            return Err(ApiError::InvalidAuthenticationToken);
        }

        let hash = TokenHash::of(token);
        let lookup = self.users.get_for_token(TokenScope::Authentication, &hash);
        match call_with_deadline(self.timeout, lookup).await {
            Ok(user) => Ok(Identity::User(Arc::new(user))),
            Err(StoreError::NotFound) => Err(ApiError::InvalidAuthenticationToken),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl Interceptor for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn process(&self, req: Request, ctx: &mut RequestContext, next: Next<'_>) -> Response {
        let mut response = match self.resolve(req.headers()).await {
            Ok(identity) => {
                ctx.set_identity(identity);
                next.run(req, ctx).await
            }
            Err(err) => err.render(ctx.environment()),
        };
        response
            .headers_mut()
            .append(header::VARY, HeaderValue::from_static("Authorization"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::models::{NewUser, Token, User};
    use crate::store::{MemoryStore, TokenStore};
    use axum::body::Body;
    use axum::http::StatusCode;

    /// Captures the identity seen downstream.
    #[derive(Default)]
    struct IdentityProbe(std::sync::Mutex<Option<Identity>>);

    #[async_trait]
    impl super::super::Endpoint for IdentityProbe {
        async fn call(&self, _req: Request, ctx: &mut RequestContext) -> Response {
            *self.0.lock().unwrap() = Some(ctx.identity().clone());
            Response::new(Body::empty())
        }
    }

    struct BrokenUsers;

    #[async_trait]
    impl UserStore for BrokenUsers {
        async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
            unimplemented!()
        }
        async fn get_by_email(&self, _email: &str) -> Result<User, StoreError> {
            unimplemented!()
        }
        async fn update(&self, _user: &User) -> Result<(), StoreError> {
            unimplemented!()
        }
        async fn get_for_token(&self, _scope: TokenScope, _hash: &TokenHash) -> Result<User, StoreError> {
            Err(StoreError::Backend("connection refused".into()))
        }
    }

    fn with_auth(value: &str) -> Request {
        axum::http::Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    }

    async fn store_with_token() -> (Arc<MemoryStore>, Token) {
        let store = Arc::new(MemoryStore::new());
        let user = UserStore::insert(
            store.as_ref(),
            NewUser {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                password_hash: String::new(),
            },
        )
        .await
        .unwrap();
        let token = Token::generate(user.id, Duration::from_secs(60), TokenScope::Authentication);
        TokenStore::insert(store.as_ref(), &token).await.unwrap();
        (store, token)
    }

    async fn run(users: Arc<dyn UserStore>, req: Request) -> (Response, Option<Identity>) {
        let probe = IdentityProbe::default();
        let mut ctx = ctx();
        let stage = Arc::new(Authenticate::new(users, Duration::from_secs(3)));
        let response = run_stage(stage, &probe, req, &mut ctx).await;
        let seen = probe.0.lock().unwrap().clone();
        (response, seen)
    }

    #[tokio::test]
    async fn test_no_header_is_anonymous() {
        let (store, _) = store_with_token().await;
        let (response, seen) = run(store, Request::new(Body::empty())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(seen.unwrap().is_anonymous());
        assert_eq!(response.headers()[header::VARY], "Authorization");
    }

    #[tokio::test]
    async fn test_wrong_scheme_rejected_with_hint() {
        let (store, token) = store_with_token().await;
        for value in [format!("Basic {}", token.plaintext), token.plaintext.clone(), format!("Bearer {} x", token.plaintext)] {
            let (response, seen) = run(store.clone(), with_auth(&value)).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value}");
            assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
            assert!(seen.is_none());
        }
    }

    #[tokio::test]
    async fn test_malformed_token_rejected() {
        let (store, _) = store_with_token().await;
        let (response, _) = run(store, with_auth("Bearer short")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let (store, _) = store_with_token().await;
        let (response, seen) = run(store, with_auth("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn test_valid_token_attaches_owner() {
        let (store, token) = store_with_token().await;
        let (response, seen) = run(store, with_auth(&format!("Bearer {}", token.plaintext))).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(seen.unwrap().user().map(|u| u.id), Some(token.user_id));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_500() {
        let (response, seen) = run(Arc::new(BrokenUsers), with_auth("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(seen.is_none());
    }
}
