//! Holiday preset CRUD

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use nexroll_core::models::HolidayPreset;

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct HolidayPresetRequest {
    pub name: String,
    pub month: u32,
    pub day: u32,
    #[serde(default)]
    pub end_month: Option<u32>,
    #[serde(default)]
    pub end_day: Option<u32>,
    #[serde(default)]
    pub category_id: Option<i64>,
}

fn validate_day(month: u32, day: u32) -> AppResult<()> {
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(AppError::bad_request("month must be 1-12 and day 1-31"));
    }
    Ok(())
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<HolidayPreset>>> {
    Ok(Json(state.repos.holiday_presets.list().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<HolidayPresetRequest>,
) -> AppResult<Json<HolidayPreset>> {
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("preset name must not be empty"));
    }
    validate_day(request.month, request.day)?;
    match (request.end_month, request.end_day) {
        (None, None) => {}
        (Some(month), Some(day)) => validate_day(month, day)?,
        _ => {
            return Err(AppError::bad_request(
                "end_month and end_day must be set together",
            ))
        }
    }
    let preset = HolidayPreset {
        id: 0,
        name: request.name.trim().to_string(),
        month: request.month,
        day: request.day,
        end_month: request.end_month,
        end_day: request.end_day,
        category_id: request.category_id,
    };
    Ok(Json(state.repos.holiday_presets.create(&preset).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.repos.holiday_presets.delete(id).await? {
        return Err(AppError::resource_not_found("holiday preset"));
    }
    Ok(Json(json!({ "deleted": true })))
}
