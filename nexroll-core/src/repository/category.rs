//! Category repository for database operations

use sqlx::{Row, SqlitePool};

use crate::{
    models::{Category, PlexMode},
    Error, Result,
};

const COLUMNS: &str = "id, name, description, plex_mode, apply_to_plex, is_system";

#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    let mode: String = row.try_get("plex_mode")?;
    Ok(Category {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        plex_mode: PlexMode::from_str(&mode).unwrap_or_default(),
        apply_to_plex: row.try_get("apply_to_plex")?,
        is_system: row.try_get("is_system")?,
    })
}

impl CategoryRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        plex_mode: PlexMode,
    ) -> Result<Category> {
        let row = sqlx::query(&format!(
            "INSERT INTO categories (name, description, plex_mode) \
             VALUES (?, ?, ?) \
             RETURNING {COLUMNS}"
        ))
        .bind(name)
        .bind(description)
        .bind(plex_mode.as_str())
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM categories WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(from_row).transpose()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM categories WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM categories ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(from_row).collect()
    }

    pub async fn update(&self, category: &Category) -> Result<Category> {
        let row = sqlx::query(&format!(
            "UPDATE categories \
             SET name = ?, description = ?, plex_mode = ?, is_system = ? \
             WHERE id = ? \
             RETURNING {COLUMNS}"
        ))
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.plex_mode.as_str())
        .bind(category.is_system)
        .bind(category.id)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the one-true `apply_to_plex` marker: clear it everywhere, then
    /// set it on `id` when given. One transaction so the invariant holds at
    /// every read.
    pub async fn set_applied(&self, id: Option<i64>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE categories SET apply_to_plex = 0")
            .execute(&mut *tx)
            .await?;
        if let Some(id) = id {
            let result = sqlx::query("UPDATE categories SET apply_to_plex = 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("category {id}")));
            }
        }
        tx.commit().await?;
        Ok(())
    }
}
