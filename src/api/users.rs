//! Registration, activation and authentication.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::http::error::ApiError;
use crate::http::json::{json_response, read_json};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::models::token::is_well_formed;
use crate::models::user::{validate_email, validate_name, validate_password};
use crate::models::{NewUser, Token, TokenHash, TokenScope, User, Validator};
use crate::notifications::{self, Notification};
use crate::resilience::call_with_deadline;
use crate::store::StoreError;

use super::ENTRIES_READ;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Registration {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Activation {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct UserEnvelope<'a> {
    user: &'a User,
}

#[derive(Serialize)]
struct TokenEnvelope<'a> {
    authentication_token: &'a Token,
}

fn check(v: Validator) -> Result<(), ApiError> {
    if v.is_valid() {
        Ok(())
    } else {
        Err(ApiError::FailedValidation(v.into_errors()))
    }
}

/// bcrypt is CPU-bound; keep it off the async workers.
async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|err| ApiError::Internal(format!("password hashing task: {err}")))?
        .map_err(|err| ApiError::Internal(format!("hashing password: {err}")))
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| ApiError::Internal(format!("password verification task: {err}")))?
        .map_err(|err| ApiError::Internal(format!("verifying password: {err}")))
}

/// `POST /v1/users`
pub async fn register(state: AppState, req: Request, _ctx: RequestContext) -> Result<Response, ApiError> {
    let security = &state.config.security;
    let input: Registration = read_json(req.into_body(), security.max_body_bytes).await?;

    let mut v = Validator::new();
    validate_name(&mut v, &input.name);
    validate_email(&mut v, &input.email);
    validate_password(&mut v, &input.password);
    check(v)?;

    let timeout = state.config.timeouts.collaborator();
    let password_hash = hash_password(input.password, security.password_cost).await?;
    let user = call_with_deadline(
        timeout,
        state.models.users.insert(NewUser {
            name: input.name,
            email: input.email,
            password_hash,
        }),
    )
    .await?;

    call_with_deadline(timeout, state.models.permissions.add_for_user(user.id, &[ENTRIES_READ])).await?;

    let token = Token::generate(
        user.id,
        std::time::Duration::from_secs(security.activation_token_ttl_secs),
        TokenScope::Activation,
    );
    call_with_deadline(timeout, state.models.tokens.insert(&token)).await?;

    let notification = Notification::Welcome {
        user_id: user.id,
        name: user.name.clone(),
        activation_token: token.plaintext,
    };
    state.tasks.spawn(
        "welcome_notification",
        notifications::deliver(state.notifier.clone(), user.email.clone(), notification),
    );

    tracing::info!(user_id = user.id, "User registered");
    Ok(json_response(StatusCode::CREATED, &UserEnvelope { user: &user }))
}

/// `PUT /v1/users/activated`
pub async fn activate(state: AppState, req: Request, _ctx: RequestContext) -> Result<Response, ApiError> {
    let input: Activation = read_json(req.into_body(), state.config.security.max_body_bytes).await?;

    let mut v = Validator::new();
    v.check(!input.token.is_empty(), "token", "must be provided");
    v.check(is_well_formed(&input.token), "token", "must be 26 bytes long");
    check(v)?;

    let timeout = state.config.timeouts.collaborator();
    let hash = TokenHash::of(&input.token);
    let mut user = match call_with_deadline(
        timeout,
        state.models.users.get_for_token(TokenScope::Activation, &hash),
    )
    .await
    {
        Err(StoreError::NotFound) => {
            return Err(ApiError::validation("token", "invalid or expired activation token"))
        }
        other => other?,
    };

    user.activated = true;
    call_with_deadline(timeout, state.models.users.update(&user)).await?;
    call_with_deadline(
        timeout,
        state.models.tokens.delete_all_for_user(TokenScope::Activation, user.id),
    )
    .await?;

    tracing::info!(user_id = user.id, "User activated");
    Ok(json_response(StatusCode::OK, &UserEnvelope { user: &user }))
}

/// `POST /v1/users/authentication`
pub async fn authenticate(state: AppState, req: Request, _ctx: RequestContext) -> Result<Response, ApiError> {
    let input: Credentials = read_json(req.into_body(), state.config.security.max_body_bytes).await?;

    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password(&mut v, &input.password);
    check(v)?;

    let timeout = state.config.timeouts.collaborator();
    let user = match call_with_deadline(timeout, state.models.users.get_by_email(&input.email)).await {
        Err(StoreError::NotFound) => return Err(ApiError::InvalidCredentials),
        other => other?,
    };

    if !verify_password(input.password, user.password_hash.clone()).await? {
        return Err(ApiError::InvalidCredentials);
    }

    let token = Token::generate(
        user.id,
        std::time::Duration::from_secs(state.config.security.authentication_token_ttl_secs),
        TokenScope::Authentication,
    );
    call_with_deadline(timeout, state.models.tokens.insert(&token)).await?;

    Ok(json_response(
        StatusCode::ACCEPTED,
        &TokenEnvelope {
            authentication_token: &token,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::http::middleware::testing::ctx;
    use crate::store::Models;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    fn state() -> AppState {
        let mut config = ServerConfig::default();
        config.security.password_cost = 4;
        AppState::new(config, Models::in_memory())
    }

    fn post(body: Value) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/v1/users")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let state = state();
        let response = register(
            state.clone(),
            post(json!({"name": "Ada", "email": "ada@example.com", "password": "pa55word!"})),
            ctx(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body(response).await;
        assert_eq!(created["user"]["activated"], false);
        assert!(created["user"].get("password_hash").is_none());

        let id = created["user"]["id"].as_i64().unwrap();
        let granted = state.models.permissions.get_all_for_user(id).await.unwrap();
        assert!(granted.include(ENTRIES_READ));

        let response = authenticate(
            state.clone(),
            post(json!({"email": "ada@example.com", "password": "pa55word!"})),
            ctx(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let token = body(response).await["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(is_well_formed(&token));
    }

    #[tokio::test]
    async fn test_register_validation_failure() {
        let err = register(state(), post(json!({"name": "", "email": "nope", "password": "short"})), ctx())
            .await
            .unwrap_err();
        match err {
            ApiError::FailedValidation(errors) => {
                assert!(errors.contains_key("name"));
                assert!(errors.contains_key("email"));
                assert!(errors.contains_key("password"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_validation_error() {
        let state = state();
        let input = json!({"name": "Ada", "email": "ada@example.com", "password": "pa55word!"});
        register(state.clone(), post(input.clone()), ctx()).await.unwrap();
        let err = register(state, post(input), ctx()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let state = state();
        register(
            state.clone(),
            post(json!({"name": "Ada", "email": "ada@example.com", "password": "pa55word!"})),
            ctx(),
        )
        .await
        .unwrap();
        let err = authenticate(state, post(json!({"email": "ada@example.com", "password": "wrong-pass"})), ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_unknown_activation_token() {
        let err = activate(state(), post(json!({"token": "A".repeat(26)})), ctx())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
