//! Saved sequence repository for database operations

use sqlx::{Row, SqlitePool};

use crate::{models::SavedSequence, Result};

const COLUMNS: &str = "id, name, steps";

#[derive(Clone)]
pub struct SavedSequenceRepository {
    pool: SqlitePool,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SavedSequence> {
    Ok(SavedSequence {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        steps: row.try_get("steps")?,
    })
}

impl SavedSequenceRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, steps: &str) -> Result<SavedSequence> {
        let row = sqlx::query(&format!(
            "INSERT INTO saved_sequences (name, steps) VALUES (?, ?) RETURNING {COLUMNS}"
        ))
        .bind(name)
        .bind(steps)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<SavedSequence>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM saved_sequences WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<SavedSequence>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM saved_sequences ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(from_row).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saved_sequences WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
