//! Settings read and update
//!
//! The engine-owned fields (`active_category`, `override_expires_at`,
//! `filler_active`, `last_schedule_fallback`) are visible on read but not
//! writable here.

use axum::{extract::State, Json};
use serde::Deserialize;

use nexroll_core::models::{FillerKind, GenrePriorityMode, PathMapping, Setting};

use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub plex_url: Option<Option<String>>,
    #[serde(default)]
    pub jellyfin_url: Option<Option<String>>,
    #[serde(default)]
    pub path_mappings: Option<Vec<PathMapping>>,
    #[serde(default)]
    pub filler_enabled: Option<bool>,
    #[serde(default)]
    pub filler_type: Option<String>,
    #[serde(default)]
    pub filler_category_id: Option<Option<i64>>,
    #[serde(default)]
    pub filler_sequence_id: Option<Option<i64>>,
    #[serde(default)]
    pub filler_coming_soon_layout: Option<String>,
    #[serde(default)]
    pub filler_coming_soon_path: Option<Option<String>>,
    #[serde(default)]
    pub clear_when_inactive: Option<bool>,
    #[serde(default)]
    pub passive_mode: Option<bool>,
    #[serde(default)]
    pub genre_auto_apply: Option<bool>,
    #[serde(default)]
    pub genre_priority_mode: Option<String>,
    #[serde(default)]
    pub genre_override_ttl_seconds: Option<i64>,
    #[serde(default)]
    pub timezone: Option<Option<String>>,
}

pub async fn get(State(state): State<AppState>) -> AppResult<Json<Setting>> {
    Ok(Json(state.repos.settings.get().await?))
}

pub async fn update(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> AppResult<Json<Setting>> {
    let mut setting = state.repos.settings.get().await?;

    if let Some(url) = request.plex_url {
        setting.plex_url = url.filter(|u| !u.trim().is_empty());
    }
    if let Some(url) = request.jellyfin_url {
        setting.jellyfin_url = url.filter(|u| !u.trim().is_empty());
    }
    if let Some(mappings) = request.path_mappings {
        if mappings.iter().any(|m| m.local.is_empty() || m.plex.is_empty()) {
            return Err(AppError::bad_request(
                "path mappings need both 'local' and 'plex' prefixes",
            ));
        }
        setting.path_mappings =
            Some(serde_json::to_string(&mappings).map_err(|e| AppError::internal(e.to_string()))?);
    }
    if let Some(enabled) = request.filler_enabled {
        setting.filler_enabled = enabled;
    }
    if let Some(kind) = request.filler_type {
        setting.filler_type = FillerKind::from_str(&kind).ok_or_else(|| {
            AppError::bad_request("filler_type must be category, sequence, or coming_soon")
        })?;
    }
    if let Some(id) = request.filler_category_id {
        setting.filler_category_id = id;
    }
    if let Some(id) = request.filler_sequence_id {
        setting.filler_sequence_id = id;
    }
    if let Some(layout) = request.filler_coming_soon_layout {
        setting.filler_coming_soon_layout = layout;
    }
    if let Some(path) = request.filler_coming_soon_path {
        setting.filler_coming_soon_path = path;
    }
    if let Some(clear) = request.clear_when_inactive {
        setting.clear_when_inactive = clear;
    }
    if let Some(passive) = request.passive_mode {
        setting.passive_mode = passive;
    }
    if let Some(auto) = request.genre_auto_apply {
        setting.genre_auto_apply = auto;
    }
    if let Some(mode) = request.genre_priority_mode {
        setting.genre_priority_mode = GenrePriorityMode::from_str(&mode).ok_or_else(|| {
            AppError::bad_request(
                "genre_priority_mode must be schedules_override or genres_override",
            )
        })?;
    }
    if let Some(ttl) = request.genre_override_ttl_seconds {
        if ttl <= 0 {
            return Err(AppError::bad_request(
                "genre_override_ttl_seconds must be positive",
            ));
        }
        setting.genre_override_ttl_seconds = ttl;
    }
    if let Some(timezone) = request.timezone {
        setting.timezone = timezone;
    }

    Ok(Json(state.repos.settings.update(&setting).await?))
}
