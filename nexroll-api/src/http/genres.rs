//! Genre mapping CRUD and the apply entry points
//!
//! The apply endpoints are automation-friendly: configuration and state
//! problems come back as 200 with a structured body so webhook-style callers
//! never see spurious 5xx.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use nexroll_core::{
    models::GenreMap,
    service::genre::{canonical, GenreApplication, GenreApplyOutcome},
    Error,
};

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateGenreMapRequest {
    pub genre: String,
    pub category_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApplyGenresRequest {
    pub genres: Vec<String>,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ApplyByKeyQuery {
    pub key: String,
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

/// Automation endpoints answer 200 with a body for anything short of an
/// internal failure.
fn automation_reply(result: Result<GenreApplyOutcome, Error>) -> AppResult<Json<Value>> {
    match result {
        Ok(outcome) => {
            let applied = matches!(outcome, GenreApplyOutcome::Applied { .. });
            let mut body = serde_json::to_value(&outcome)
                .map_err(|e| AppError::internal(e.to_string()))?;
            if let Some(object) = body.as_object_mut() {
                object.insert("applied".to_string(), json!(applied));
            }
            Ok(Json(body))
        }
        Err(Error::Config(m)) | Err(Error::State(m)) | Err(Error::Conflict(m)) => {
            Ok(Json(json!({ "applied": false, "error": m })))
        }
        Err(Error::Server(e)) => Ok(Json(json!({
            "applied": false,
            "error": e.to_string(),
            "kind": e.kind(),
        }))),
        Err(e) => Err(AppError::from(e)),
    }
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<GenreMap>>> {
    Ok(Json(state.repos.genre_maps.list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateGenreMapRequest>,
) -> AppResult<Json<GenreMap>> {
    let norm = canonical(&request.genre);
    if norm.is_empty() {
        return Err(AppError::bad_request("genre normalises to an empty key"));
    }
    if state.repos.categories.get_by_id(request.category_id).await?.is_none() {
        return Err(AppError::resource_not_found("category"));
    }
    let map = state
        .repos
        .genre_maps
        .create(request.genre.trim(), &norm, request.category_id)
        .await?;
    Ok(Json(map))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.repos.genre_maps.delete(id).await? {
        return Err(AppError::resource_not_found("genre map"));
    }
    Ok(Json(json!({ "deleted": true })))
}

/// Direct genre-list apply.
pub async fn apply(
    State(state): State<AppState>,
    Json(request): Json<ApplyGenresRequest>,
) -> AppResult<Json<Value>> {
    automation_reply(
        state
            .engine
            .apply_genres(request.genres, request.ttl_seconds)
            .await,
    )
}

/// Apply by rating key, the same path the webhook receiver takes.
pub async fn apply_by_key(
    State(state): State<AppState>,
    Query(query): Query<ApplyByKeyQuery>,
) -> AppResult<Json<Value>> {
    automation_reply(
        state
            .engine
            .apply_by_rating_key(&query.key, query.ttl_seconds)
            .await,
    )
}

/// Rolling log of the last ten genre applications.
pub async fn recent(State(state): State<AppState>) -> Json<Vec<GenreApplication>> {
    Json(state.engine.recent_genre_applications())
}
