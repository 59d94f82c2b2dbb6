use serde::{Deserialize, Serialize};

/// One physical video file known to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preroll {
    pub id: i64,
    pub filename: String,
    /// Absolute path in the engine's filesystem view.
    pub path: String,
    pub display_name: Option<String>,
    /// Primary category; a preroll may belong to more via the membership table.
    pub category_id: Option<i64>,
    pub duration_seconds: Option<f64>,
    pub file_size: Option<i64>,
    /// When false this is an external mapping; the engine never renames,
    /// moves or deletes the underlying file.
    pub managed: bool,
}
