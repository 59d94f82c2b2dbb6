//! Schedule repository for database operations

use chrono::NaiveDateTime;
use sqlx::{Row, SqlitePool};

use crate::{
    models::{Schedule, ScheduleKind},
    Result,
};

const COLUMNS: &str = "id, name, kind, start_date, end_date, category_id, \
     fallback_category_id, shuffle, playlist, priority, exclusive, blend_enabled, \
     is_active, recurrence_pattern, sequence, last_run, next_run";

#[derive(Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Schedule> {
    let kind: String = row.try_get("kind")?;
    Ok(Schedule {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        kind: ScheduleKind::from_str(&kind).unwrap_or(ScheduleKind::Custom),
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        category_id: row.try_get("category_id")?,
        fallback_category_id: row.try_get("fallback_category_id")?,
        shuffle: row.try_get("shuffle")?,
        playlist: row.try_get("playlist")?,
        priority: row.try_get("priority")?,
        exclusive: row.try_get("exclusive")?,
        blend_enabled: row.try_get("blend_enabled")?,
        is_active: row.try_get("is_active")?,
        recurrence_pattern: row.try_get("recurrence_pattern")?,
        sequence: row.try_get("sequence")?,
        last_run: row.try_get("last_run")?,
        next_run: row.try_get("next_run")?,
    })
}

impl ScheduleRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, schedule: &Schedule) -> Result<Schedule> {
        let row = sqlx::query(&format!(
            "INSERT INTO schedules \
             (name, kind, start_date, end_date, category_id, fallback_category_id, \
              shuffle, playlist, priority, exclusive, blend_enabled, is_active, \
              recurrence_pattern, sequence) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        ))
        .bind(&schedule.name)
        .bind(schedule.kind.as_str())
        .bind(schedule.start_date)
        .bind(schedule.end_date)
        .bind(schedule.category_id)
        .bind(schedule.fallback_category_id)
        .bind(schedule.shuffle)
        .bind(schedule.playlist)
        .bind(schedule.priority)
        .bind(schedule.exclusive)
        .bind(schedule.blend_enabled)
        .bind(schedule.is_active)
        .bind(&schedule.recurrence_pattern)
        .bind(&schedule.sequence)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Schedule>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM schedules WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM schedules ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(from_row).collect()
    }

    /// Schedules the operator has enabled. Window evaluation happens in the
    /// evaluator; this only filters the `is_active` flag.
    pub async fn list_enabled(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM schedules WHERE is_active = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(from_row).collect()
    }

    pub async fn update(&self, schedule: &Schedule) -> Result<Schedule> {
        let row = sqlx::query(&format!(
            "UPDATE schedules \
             SET name = ?, kind = ?, start_date = ?, end_date = ?, category_id = ?, \
                 fallback_category_id = ?, shuffle = ?, playlist = ?, priority = ?, \
                 exclusive = ?, blend_enabled = ?, is_active = ?, \
                 recurrence_pattern = ?, sequence = ? \
             WHERE id = ? \
             RETURNING {COLUMNS}"
        ))
        .bind(&schedule.name)
        .bind(schedule.kind.as_str())
        .bind(schedule.start_date)
        .bind(schedule.end_date)
        .bind(schedule.category_id)
        .bind(schedule.fallback_category_id)
        .bind(schedule.shuffle)
        .bind(schedule.playlist)
        .bind(schedule.priority)
        .bind(schedule.exclusive)
        .bind(schedule.blend_enabled)
        .bind(schedule.is_active)
        .bind(&schedule.recurrence_pattern)
        .bind(&schedule.sequence)
        .bind(schedule.id)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Engine bookkeeping after a successful apply.
    pub async fn set_bookkeeping(
        &self,
        id: i64,
        last_run: NaiveDateTime,
        next_run: Option<NaiveDateTime>,
    ) -> Result<()> {
        sqlx::query("UPDATE schedules SET last_run = ?, next_run = ? WHERE id = ?")
            .bind(last_run)
            .bind(next_run)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
