//! Preroll registration and management
//!
//! Prerolls enter the engine as filesystem references. A `managed` preroll
//! belongs to the engine and its file is removed on delete; an unmanaged one
//! is an external mapping whose file is never touched.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use nexroll_core::models::Preroll;

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreatePrerollRequest {
    pub path: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub additional_categories: Vec<i64>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub file_size: Option<i64>,
    /// Defaults to false: registrations through the API map external files.
    #[serde(default)]
    pub managed: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrerollRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub category_id: Option<Option<i64>>,
    #[serde(default)]
    pub additional_categories: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct PrerollResponse {
    #[serde(flatten)]
    pub preroll: Preroll,
    pub additional_categories: Vec<i64>,
}

fn filename_from_path(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .next()
        .unwrap_or(path)
        .to_string()
}

async fn with_memberships(state: &AppState, preroll: Preroll) -> AppResult<PrerollResponse> {
    let additional = state.repos.prerolls.additional_categories(preroll.id).await?;
    Ok(PrerollResponse {
        preroll,
        additional_categories: additional,
    })
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<PrerollResponse>>> {
    let prerolls = state.repos.prerolls.list().await?;
    let mut out = Vec::with_capacity(prerolls.len());
    for preroll in prerolls {
        out.push(with_memberships(&state, preroll).await?);
    }
    Ok(Json(out))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreatePrerollRequest>,
) -> AppResult<Json<PrerollResponse>> {
    if request.path.trim().is_empty() {
        return Err(AppError::bad_request("preroll path must not be empty"));
    }
    let path = request.path.trim().to_string();
    let preroll = Preroll {
        id: 0,
        filename: request
            .filename
            .unwrap_or_else(|| filename_from_path(&path)),
        path,
        display_name: request.display_name,
        category_id: request.category_id,
        duration_seconds: request.duration_seconds,
        file_size: request.file_size,
        managed: request.managed,
    };
    let created = state.repos.prerolls.create(&preroll).await?;
    if !request.additional_categories.is_empty() {
        state
            .repos
            .prerolls
            .set_additional_categories(created.id, &request.additional_categories)
            .await?;
    }
    with_memberships(&state, created).await.map(Json)
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PrerollResponse>> {
    let preroll = state
        .repos
        .prerolls
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("preroll"))?;
    with_memberships(&state, preroll).await.map(Json)
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePrerollRequest>,
) -> AppResult<Json<PrerollResponse>> {
    let mut preroll = state
        .repos
        .prerolls
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("preroll"))?;

    if let Some(display_name) = request.display_name {
        preroll.display_name = Some(display_name);
    }
    if let Some(category_id) = request.category_id {
        preroll.category_id = category_id;
    }
    let updated = state.repos.prerolls.update(&preroll).await?;

    // Editing memberships never touches the primary category.
    if let Some(additional) = request.additional_categories {
        state
            .repos
            .prerolls
            .set_additional_categories(id, &additional)
            .await?;
    }
    with_memberships(&state, updated).await.map(Json)
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    let preroll = state
        .repos
        .prerolls
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::resource_not_found("preroll"))?;

    let mut file_removed = false;
    if preroll.managed {
        match std::fs::remove_file(&preroll.path) {
            Ok(()) => file_removed = true,
            Err(e) => warn!("could not remove managed preroll file {}: {e}", preroll.path),
        }
    }
    state.repos.prerolls.delete(id).await?;
    Ok(Json(json!({ "deleted": true, "file_removed": file_removed })))
}
