//! Genre map repository for database operations

use sqlx::{Row, SqlitePool};

use crate::{models::GenreMap, Result};

const COLUMNS: &str = "id, genre, genre_norm, category_id";

#[derive(Clone)]
pub struct GenreMapRepository {
    pool: SqlitePool,
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<GenreMap> {
    Ok(GenreMap {
        id: row.try_get("id")?,
        genre: row.try_get("genre")?,
        genre_norm: row.try_get("genre_norm")?,
        category_id: row.try_get("category_id")?,
    })
}

impl GenreMapRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        genre: &str,
        genre_norm: &str,
        category_id: i64,
    ) -> Result<GenreMap> {
        let row = sqlx::query(&format!(
            "INSERT INTO genre_maps (genre, genre_norm, category_id) \
             VALUES (?, ?, ?) \
             RETURNING {COLUMNS}"
        ))
        .bind(genre)
        .bind(genre_norm)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;

        from_row(&row)
    }

    pub async fn get_by_norm(&self, genre_norm: &str) -> Result<Option<GenreMap>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM genre_maps WHERE genre_norm = ?"
        ))
        .bind(genre_norm)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(from_row).transpose()
    }

    pub async fn list(&self) -> Result<Vec<GenreMap>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM genre_maps ORDER BY genre_norm"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(from_row).collect()
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM genre_maps WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
