//! Holiday preset repository for database operations

use sqlx::{Row, SqlitePool};

use crate::{models::HolidayPreset, Result};

const COLUMNS: &str = "id, name, month, day, end_month, end_day, category_id";

#[derive(Clone)]
pub struct HolidayPresetRepository {
    pool: SqlitePool,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<HolidayPreset> {
    Ok(HolidayPreset {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        month: row.try_get::<i64, _>("month")? as u32,
        day: row.try_get::<i64, _>("day")? as u32,
        end_month: row.try_get::<Option<i64>, _>("end_month")?.map(|v| v as u32),
        end_day: row.try_get::<Option<i64>, _>("end_day")?.map(|v| v as u32),
        category_id: row.try_get("category_id")?,
    })
}

impl HolidayPresetRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, preset: &HolidayPreset) -> Result<HolidayPreset> {
        let row = sqlx::query(&format!(
            "INSERT INTO holiday_presets (name, month, day, end_month, end_day, category_id) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        ))
        .bind(&preset.name)
        .bind(preset.month as i64)
        .bind(preset.day as i64)
        .bind(preset.end_month.map(|v| v as i64))
        .bind(preset.end_day.map(|v| v as i64))
        .bind(preset.category_id)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<HolidayPreset>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM holiday_presets WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(from_row).transpose()
    }

    /// The preset bound to a schedule's category, if any. `holiday` schedules
    /// resolve their window through this link.
    pub async fn get_by_category(&self, category_id: i64) -> Result<Option<HolidayPreset>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM holiday_presets WHERE category_id = ? ORDER BY id LIMIT 1"
        ))
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<HolidayPreset>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM holiday_presets ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(from_row).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM holiday_presets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
