//! Preroll repository for database operations

use sqlx::{Row, SqlitePool};

use crate::{models::Preroll, Result};

const COLUMNS: &str =
    "id, filename, path, display_name, category_id, duration_seconds, file_size, managed";

#[derive(Clone)]
pub struct PrerollRepository {
    pool: SqlitePool,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Preroll> {
    Ok(Preroll {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        path: row.try_get("path")?,
        display_name: row.try_get("display_name")?,
        category_id: row.try_get("category_id")?,
        duration_seconds: row.try_get("duration_seconds")?,
        file_size: row.try_get("file_size")?,
        managed: row.try_get("managed")?,
    })
}

impl PrerollRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, preroll: &Preroll) -> Result<Preroll> {
        let row = sqlx::query(&format!(
            "INSERT INTO prerolls \
             (filename, path, display_name, category_id, duration_seconds, file_size, managed) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        ))
        .bind(&preroll.filename)
        .bind(&preroll.path)
        .bind(&preroll.display_name)
        .bind(preroll.category_id)
        .bind(preroll.duration_seconds)
        .bind(preroll.file_size)
        .bind(preroll.managed)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Preroll>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM prerolls WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Preroll>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM prerolls ORDER BY filename"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(from_row).collect()
    }

    /// The union pool for a category: prerolls whose primary category matches
    /// plus those linked through the membership table, deduplicated.
    pub async fn list_by_category(&self, category_id: i64) -> Result<Vec<Preroll>> {
        let rows = sqlx::query(
            "SELECT DISTINCT p.id, p.filename, p.path, p.display_name, p.category_id, \
                    p.duration_seconds, p.file_size, p.managed \
             FROM prerolls p \
             LEFT JOIN preroll_categories pc ON pc.preroll_id = p.id \
             WHERE p.category_id = ?1 OR pc.category_id = ?1 \
             ORDER BY p.id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(from_row).collect()
    }

    pub async fn update(&self, preroll: &Preroll) -> Result<Preroll> {
        let row = sqlx::query(&format!(
            "UPDATE prerolls \
             SET filename = ?, path = ?, display_name = ?, category_id = ?, \
                 duration_seconds = ?, file_size = ?, managed = ? \
             WHERE id = ? \
             RETURNING {COLUMNS}"
        ))
        .bind(&preroll.filename)
        .bind(&preroll.path)
        .bind(&preroll.display_name)
        .bind(preroll.category_id)
        .bind(preroll.duration_seconds)
        .bind(preroll.file_size)
        .bind(preroll.managed)
        .bind(preroll.id)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM prerolls WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn additional_categories(&self, preroll_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT category_id FROM preroll_categories WHERE preroll_id = ? ORDER BY category_id",
        )
        .bind(preroll_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok(row.try_get("category_id")?))
            .collect()
    }

    /// Replace the additional-category memberships for a preroll. The primary
    /// category is untouched; editing memberships never removes it implicitly.
    pub async fn set_additional_categories(
        &self,
        preroll_id: i64,
        category_ids: &[i64],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM preroll_categories WHERE preroll_id = ?")
            .bind(preroll_id)
            .execute(&mut *tx)
            .await?;
        for category_id in category_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO preroll_categories (preroll_id, category_id) VALUES (?, ?)",
            )
            .bind(preroll_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
