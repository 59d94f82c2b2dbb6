use serde::{Deserialize, Serialize};

/// Maps a canonical genre key to a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreMap {
    pub id: i64,
    /// Raw label as the operator entered it.
    pub genre: String,
    /// Canonical key (see `service::genre::canonical`); unique.
    pub genre_norm: String,
    pub category_id: i64,
}
