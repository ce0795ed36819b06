//! CRUD for `/v1/entries`.

use axum::extract::{Query, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::json::{json_response, read_json};
use crate::http::request::RequestContext;
use crate::http::server::AppState;
use crate::models::{Entry, EntryFilter, EntryPatch, NewEntry, Validator};
use crate::resilience::call_with_deadline;

#[derive(Serialize)]
struct EntryEnvelope<'a> {
    entry: &'a Entry,
}

#[derive(Serialize)]
struct Metadata {
    total_records: usize,
}

#[derive(Serialize)]
struct EntryList {
    metadata: Metadata,
    entries: Vec<Entry>,
}

fn check(v: Validator) -> Result<(), ApiError> {
    if v.is_valid() {
        Ok(())
    } else {
        Err(ApiError::FailedValidation(v.into_errors()))
    }
}

/// `GET /v1/entries?title=..&category=..`
pub async fn list(state: AppState, req: Request, _ctx: RequestContext) -> Result<Response, ApiError> {
    let Query(filter) = Query::<EntryFilter>::try_from_uri(req.uri())
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let entries = call_with_deadline(state.config.timeouts.collaborator(), state.models.entries.list(&filter)).await?;
    Ok(json_response(
        StatusCode::OK,
        &EntryList {
            metadata: Metadata {
                total_records: entries.len(),
            },
            entries,
        },
    ))
}

/// `POST /v1/entries`
pub async fn create(state: AppState, req: Request, _ctx: RequestContext) -> Result<Response, ApiError> {
    let input: NewEntry = read_json(req.into_body(), state.config.security.max_body_bytes).await?;
    check(input.validate())?;

    let entry = call_with_deadline(state.config.timeouts.collaborator(), state.models.entries.insert(input)).await?;

    let mut response = json_response(StatusCode::CREATED, &EntryEnvelope { entry: &entry });
    if let Ok(location) = HeaderValue::from_str(&format!("/v1/entries/{}", entry.id)) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    Ok(response)
}

/// `GET /v1/entries/:id`
pub async fn show(state: AppState, _req: Request, ctx: RequestContext) -> Result<Response, ApiError> {
    let id = ctx.params().id()?;
    let entry = call_with_deadline(state.config.timeouts.collaborator(), state.models.entries.get(id)).await?;
    Ok(json_response(StatusCode::OK, &EntryEnvelope { entry: &entry }))
}

/// `PATCH /v1/entries/:id`
pub async fn update(state: AppState, req: Request, ctx: RequestContext) -> Result<Response, ApiError> {
    let id = ctx.params().id()?;
    let timeout = state.config.timeouts.collaborator();
    let mut entry = call_with_deadline(timeout, state.models.entries.get(id)).await?;

    let patch: EntryPatch = read_json(req.into_body(), state.config.security.max_body_bytes).await?;
    check(patch.validate())?;
    patch.apply(&mut entry);

    call_with_deadline(timeout, state.models.entries.update(&entry)).await?;
    Ok(json_response(StatusCode::OK, &EntryEnvelope { entry: &entry }))
}

/// `DELETE /v1/entries/:id`
pub async fn delete(state: AppState, _req: Request, ctx: RequestContext) -> Result<Response, ApiError> {
    let id = ctx.params().id()?;
    call_with_deadline(state.config.timeouts.collaborator(), state.models.entries.delete(id)).await?;
    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({ "message": "entry successfully deleted" }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::testing::ctx;
    use crate::http::request::PathParams;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    fn request(uri: &str, body: Value) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn ctx_with_id(id: &str) -> RequestContext {
        let mut ctx = ctx();
        let mut params = PathParams::default();
        params.insert("id", id);
        ctx.set_params(params);
        ctx
    }

    async fn body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_location() {
        let state = AppState::for_tests();
        let response = create(
            state,
            request("/v1/entries", json!({"title": "Dune", "category": "book", "score": 9.5})),
            ctx(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/v1/entries/1");
        assert_eq!(body(response).await["entry"]["title"], "Dune");
    }

    #[tokio::test]
    async fn test_create_missing_fields_fails_validation() {
        let err = create(AppState::for_tests(), request("/v1/entries", json!({})), ctx())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_list_filters() {
        let state = AppState::for_tests();
        for (title, category) in [("Dune", "book"), ("Alien", "film")] {
            create(
                state.clone(),
                request("/v1/entries", json!({"title": title, "category": category})),
                ctx(),
            )
            .await
            .unwrap();
        }

        let response = update(state.clone(), request("/v1/entries/2", json!({"score": 7.0})), ctx_with_id("2"))
            .await
            .unwrap();
        let updated = body(response).await;
        assert_eq!(updated["entry"]["version"], 2);
        assert_eq!(updated["entry"]["score"], 7.0);

        let response = list(state, request("/v1/entries?category=FILM", json!(null)), ctx())
            .await
            .unwrap();
        let listed = body(response).await;
        assert_eq!(listed["metadata"]["total_records"], 1);
        assert_eq!(listed["entries"][0]["title"], "Alien");
    }

    #[tokio::test]
    async fn test_show_and_delete_missing_is_404() {
        let state = AppState::for_tests();
        let err = show(state.clone(), request("/v1/entries/5", json!(null)), ctx_with_id("5"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = delete(state, request("/v1/entries/5", json!(null)), ctx_with_id("5"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
