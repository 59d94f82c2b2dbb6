//! Settings repository for the singleton row
//!
//! Operator-editable fields are written through `update`; the engine-owned
//! fields (`active_category`, `last_schedule_fallback`, `override_expires_at`,
//! `filler_active`) have dedicated setters so each write stays one short
//! transaction.

use chrono::NaiveDateTime;
use sqlx::{Row, SqlitePool};

use crate::{
    models::{FillerKind, GenrePriorityMode, Setting},
    Result,
};

const COLUMNS: &str = "plex_url, jellyfin_url, active_category, last_schedule_fallback, \
     override_expires_at, path_mappings, filler_enabled, filler_type, filler_category_id, \
     filler_sequence_id, filler_coming_soon_layout, filler_coming_soon_path, filler_active, \
     clear_when_inactive, passive_mode, genre_auto_apply, genre_priority_mode, \
     genre_override_ttl_seconds, timezone";

#[derive(Clone)]
pub struct SettingRepository {
    pool: SqlitePool,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Setting> {
    let filler_type: String = row.try_get("filler_type")?;
    let priority_mode: String = row.try_get("genre_priority_mode")?;
    Ok(Setting {
        plex_url: row.try_get("plex_url")?,
        jellyfin_url: row.try_get("jellyfin_url")?,
        active_category: row.try_get("active_category")?,
        last_schedule_fallback: row.try_get("last_schedule_fallback")?,
        override_expires_at: row.try_get("override_expires_at")?,
        path_mappings: row.try_get("path_mappings")?,
        filler_enabled: row.try_get("filler_enabled")?,
        filler_type: FillerKind::from_str(&filler_type).unwrap_or_default(),
        filler_category_id: row.try_get("filler_category_id")?,
        filler_sequence_id: row.try_get("filler_sequence_id")?,
        filler_coming_soon_layout: row.try_get("filler_coming_soon_layout")?,
        filler_coming_soon_path: row.try_get("filler_coming_soon_path")?,
        filler_active: row.try_get("filler_active")?,
        clear_when_inactive: row.try_get("clear_when_inactive")?,
        passive_mode: row.try_get("passive_mode")?,
        genre_auto_apply: row.try_get("genre_auto_apply")?,
        genre_priority_mode: GenrePriorityMode::from_str(&priority_mode).unwrap_or_default(),
        genre_override_ttl_seconds: row.try_get("genre_override_ttl_seconds")?,
        timezone: row.try_get("timezone")?,
    })
}

impl SettingRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<Setting> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM settings WHERE id = 1"))
            .fetch_one(&self.pool)
            .await?;

        from_row(&row)
    }

    /// Write the operator-editable fields. Engine-owned fields are excluded
    /// so a settings edit can never clobber an in-flight decision.
    pub async fn update(&self, setting: &Setting) -> Result<Setting> {
        let row = sqlx::query(&format!(
            "UPDATE settings \
             SET plex_url = ?, jellyfin_url = ?, path_mappings = ?, \
                 filler_enabled = ?, filler_type = ?, filler_category_id = ?, \
                 filler_sequence_id = ?, filler_coming_soon_layout = ?, \
                 filler_coming_soon_path = ?, clear_when_inactive = ?, passive_mode = ?, \
                 genre_auto_apply = ?, genre_priority_mode = ?, \
                 genre_override_ttl_seconds = ?, timezone = ? \
             WHERE id = 1 \
             RETURNING {COLUMNS}"
        ))
        .bind(&setting.plex_url)
        .bind(&setting.jellyfin_url)
        .bind(&setting.path_mappings)
        .bind(setting.filler_enabled)
        .bind(setting.filler_type.as_str())
        .bind(setting.filler_category_id)
        .bind(setting.filler_sequence_id)
        .bind(&setting.filler_coming_soon_layout)
        .bind(&setting.filler_coming_soon_path)
        .bind(setting.clear_when_inactive)
        .bind(setting.passive_mode)
        .bind(setting.genre_auto_apply)
        .bind(setting.genre_priority_mode.as_str())
        .bind(setting.genre_override_ttl_seconds)
        .bind(&setting.timezone)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    /// Record the result of an apply in one transaction: the active category
    /// and whatever the filler state becomes. A concrete schedule win clears
    /// filler; entering filler clears the active category.
    pub async fn record_applied(
        &self,
        active_category: Option<i64>,
        filler_active: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE settings SET active_category = ?, filler_active = ? WHERE id = 1")
            .bind(active_category)
            .bind(filler_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_last_schedule_fallback(&self, category_id: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE settings SET last_schedule_fallback = ? WHERE id = 1")
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_override_expires_at(&self, expires: Option<NaiveDateTime>) -> Result<()> {
        sqlx::query("UPDATE settings SET override_expires_at = ? WHERE id = 1")
            .bind(expires)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
