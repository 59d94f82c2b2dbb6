//! Schedule CRUD with load-time validation
//!
//! Sequence steps and recurrence patterns are validated strictly here;
//! malformed definitions never reach the store. The engine itself stays
//! lenient with rows written by older builds.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use nexroll_core::models::{
    schedule::parse_sequence_strict, RecurrencePattern, Schedule, ScheduleKind, TimeRange,
};

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_date: NaiveDateTime,
    #[serde(default)]
    pub end_date: Option<NaiveDateTime>,
    pub category_id: i64,
    #[serde(default)]
    pub fallback_category_id: Option<i64>,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default)]
    pub playlist: bool,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub blend_enabled: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<Value>,
    #[serde(default)]
    pub sequence: Option<Value>,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i64 {
    5
}

fn validate(request: &ScheduleRequest) -> AppResult<(ScheduleKind, Option<String>, Option<String>)> {
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("schedule name must not be empty"));
    }
    let kind = ScheduleKind::from_str(&request.kind).ok_or_else(|| {
        AppError::bad_request(
            "type must be one of monthly, yearly, holiday, holiday_dynamic, custom",
        )
    })?;
    if !(0..=10).contains(&request.priority) {
        return Err(AppError::bad_request("priority must be between 0 and 10"));
    }
    if let Some(end) = request.end_date {
        if end < request.start_date {
            return Err(AppError::bad_request("end_date must not precede start_date"));
        }
    }

    let pattern = match &request.recurrence_pattern {
        None => None,
        Some(raw) => {
            let parsed: RecurrencePattern = serde_json::from_value(raw.clone())
                .map_err(|e| AppError::bad_request(format!("invalid recurrence_pattern: {e}")))?;
            if let Some(range) = &parsed.time_range {
                if TimeRange::parse_minutes(&range.start).is_none() {
                    return Err(AppError::bad_request(
                        "timeRange.start must be HH:MM within 00:00..23:59",
                    ));
                }
                if let Some(end) = &range.end {
                    if TimeRange::parse_minutes(end).is_none() {
                        return Err(AppError::bad_request(
                            "timeRange.end must be HH:MM within 00:00..23:59",
                        ));
                    }
                }
            }
            if let Some(days) = &parsed.days_of_week {
                if days.iter().any(|d| *d > 6) {
                    return Err(AppError::bad_request(
                        "daysOfWeek entries must be 0 (Monday) through 6 (Sunday)",
                    ));
                }
            }
            if parsed.is_holiday_dynamic() && parsed.name.is_none() {
                return Err(AppError::bad_request(
                    "holiday_dynamic patterns require a holiday name",
                ));
            }
            Some(serde_json::to_string(raw).map_err(|e| AppError::internal(e.to_string()))?)
        }
    };

    let sequence = match &request.sequence {
        None => None,
        Some(raw) => {
            // Unknown step tags are rejected at load
            parse_sequence_strict(raw).map_err(AppError::from)?;
            Some(serde_json::to_string(raw).map_err(|e| AppError::internal(e.to_string()))?)
        }
    };

    Ok((kind, pattern, sequence))
}

fn build(request: &ScheduleRequest, id: i64) -> AppResult<Schedule> {
    let (kind, pattern, sequence) = validate(request)?;
    Ok(Schedule {
        id,
        name: request.name.trim().to_string(),
        kind,
        start_date: request.start_date,
        end_date: request.end_date,
        category_id: request.category_id,
        fallback_category_id: request.fallback_category_id,
        shuffle: request.shuffle,
        playlist: request.playlist,
        priority: request.priority,
        exclusive: request.exclusive,
        blend_enabled: request.blend_enabled,
        is_active: request.is_active,
        recurrence_pattern: pattern,
        sequence,
        last_run: None,
        next_run: None,
    })
}

pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(state.repos.schedules.list().await?))
}

pub async fn active(State(state): State<AppState>) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(state.engine.active_schedules().await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> AppResult<Json<Schedule>> {
    let schedule = build(&request, 0)?;
    Ok(Json(state.repos.schedules.create(&schedule).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Schedule>> {
    state
        .repos
        .schedules
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::resource_not_found("schedule"))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ScheduleRequest>,
) -> AppResult<Json<Schedule>> {
    if state.repos.schedules.get_by_id(id).await?.is_none() {
        return Err(AppError::resource_not_found("schedule"));
    }
    let schedule = build(&request, id)?;
    let updated = state.repos.schedules.update(&schedule).await?;
    // An edited sequence starts a fresh rotation cycle
    state.engine.reset_rotation(id);
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    if !state.repos.schedules.delete(id).await? {
        return Err(AppError::resource_not_found("schedule"));
    }
    state.engine.reset_rotation(id);
    Ok(Json(json!({ "deleted": true })))
}
