//! Category CRUD and the synchronous apply endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use nexroll_core::models::{Category, PlexMode};

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub plex_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub plex_mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub applied: bool,
    pub value: String,
}

fn parse_mode(raw: Option<&str>) -> AppResult<PlexMode> {
    match raw {
        None => Ok(PlexMode::default()),
        Some(raw) => PlexMode::from_str(raw)
            .ok_or_else(|| AppError::bad_request("plex_mode must be 'shuffle' or 'playlist'")),
    }
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.repos.categories.list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateCategoryRequest>,
) -> AppResult<Json<Category>> {
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("category name must not be empty"));
    }
    let mode = parse_mode(request.plex_mode.as_deref())?;
    let category = state
        .repos
        .categories
        .create(request.name.trim(), request.description.as_deref(), mode)
        .await?;
    Ok(Json(category))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Category>> {
    state
        .repos
        .categories
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::resource_not_found("category"))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCategoryRequest>,
) -> AppResult<Json<Category>> {
    let mut category = state
        .repos
        .categories
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("category"))?;

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("category name must not be empty"));
        }
        category.name = name.trim().to_string();
    }
    if let Some(description) = request.description {
        category.description = Some(description);
    }
    if let Some(mode) = request.plex_mode {
        category.plex_mode = parse_mode(Some(&mode))?;
    }

    Ok(Json(state.repos.categories.update(&category).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.repos.categories.delete(id).await? {
        return Err(AppError::resource_not_found("category"));
    }
    Ok(Json(json!({ "deleted": true })))
}

/// Apply a category's pool to the media server right now, through the same
/// translate/validate/write/readback path the scheduler uses.
pub async fn apply(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApplyResponse>> {
    let value = state.engine.applier().apply_category(id).await?;
    state.repos.settings.record_applied(Some(id), None).await?;
    Ok(Json(ApplyResponse {
        applied: true,
        value,
    }))
}
