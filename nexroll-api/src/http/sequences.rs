//! Saved sequence CRUD (filler sequences)

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use nexroll_core::models::{schedule::parse_sequence_strict, SavedSequence};

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SavedSequenceRequest {
    pub name: String,
    pub steps: Value,
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<SavedSequence>>> {
    Ok(Json(state.repos.saved_sequences.list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<SavedSequenceRequest>,
) -> AppResult<Json<SavedSequence>> {
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("sequence name must not be empty"));
    }
    let steps = parse_sequence_strict(&request.steps).map_err(AppError::from)?;
    if steps.is_empty() {
        return Err(AppError::bad_request("sequence needs at least one step"));
    }
    let raw = serde_json::to_string(&request.steps).map_err(|e| AppError::internal(e.to_string()))?;
    let created = state
        .repos
        .saved_sequences
        .create(request.name.trim(), &raw)
        .await?;
    Ok(Json(created))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<SavedSequence>> {
    state
        .repos
        .saved_sequences
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::resource_not_found("saved sequence"))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.repos.saved_sequences.delete(id).await? {
        return Err(AppError::resource_not_found("saved sequence"));
    }
    Ok(Json(json!({ "deleted": true })))
}
