use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One longest-prefix rewrite rule from the engine's filesystem view to the
/// media server's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub local: String,
    pub plex: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerKind {
    Category,
    Sequence,
    ComingSoon,
}

impl FillerKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "category" => Some(Self::Category),
            "sequence" => Some(Self::Sequence),
            "coming_soon" => Some(Self::ComingSoon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Sequence => "sequence",
            Self::ComingSoon => "coming_soon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenrePriorityMode {
    /// Active schedules suppress genre applications.
    SchedulesOverride,
    /// Genre applications may pre-empt active schedules.
    GenresOverride,
}

impl GenrePriorityMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "schedules_override" => Some(Self::SchedulesOverride),
            "genres_override" => Some(Self::GenresOverride),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchedulesOverride => "schedules_override",
            Self::GenresOverride => "genres_override",
        }
    }
}

/// What the gap filler is currently serving, encoded for the settings row as
/// `category:<id>`, `sequence:<id>` or `coming_soon:<layout>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillerActive {
    Category(i64),
    Sequence(i64),
    ComingSoon(String),
}

impl FillerActive {
    pub fn encode(&self) -> String {
        match self {
            Self::Category(id) => format!("category:{id}"),
            Self::Sequence(id) => format!("sequence:{id}"),
            Self::ComingSoon(layout) => format!("coming_soon:{layout}"),
        }
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (kind, rest) = raw.split_once(':')?;
        match kind {
            "category" => rest.parse().ok().map(Self::Category),
            "sequence" => rest.parse().ok().map(Self::Sequence),
            "coming_soon" => Some(Self::ComingSoon(rest.to_string())),
            _ => None,
        }
    }
}

/// Process-wide singleton row. Server tokens are resolved through the secure
/// store at call time and never persisted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Setting {
    pub plex_url: Option<String>,
    pub jellyfin_url: Option<String>,
    /// Last category the engine applied; engine-owned.
    pub active_category: Option<i64>,
    /// Fallback recorded from the most recent winning schedule; engine-owned.
    pub last_schedule_fallback: Option<i64>,
    /// Genre-apply suppression window; engine-owned.
    pub override_expires_at: Option<NaiveDateTime>,
    pub path_mappings: Option<String>,
    pub filler_enabled: bool,
    pub filler_type: FillerKind,
    pub filler_category_id: Option<i64>,
    pub filler_sequence_id: Option<i64>,
    pub filler_coming_soon_layout: String,
    pub filler_coming_soon_path: Option<String>,
    /// Encoded `FillerActive`; engine-owned.
    pub filler_active: Option<String>,
    pub clear_when_inactive: bool,
    pub passive_mode: bool,
    pub genre_auto_apply: bool,
    pub genre_priority_mode: GenrePriorityMode,
    pub genre_override_ttl_seconds: i64,
    pub timezone: Option<String>,
}

impl Setting {
    pub fn mappings(&self) -> Vec<PathMapping> {
        let Some(raw) = self.path_mappings.as_deref() else {
            return Vec::new();
        };
        let parsed: Vec<PathMapping> = serde_json::from_str(raw).unwrap_or_default();
        parsed
            .into_iter()
            .filter(|m| !m.local.is_empty() && !m.plex.is_empty())
            .collect()
    }

    pub fn decoded_filler_active(&self) -> Option<FillerActive> {
        self.filler_active.as_deref().and_then(FillerActive::decode)
    }
}

impl Default for FillerKind {
    fn default() -> Self {
        Self::Category
    }
}

impl Default for GenrePriorityMode {
    fn default() -> Self {
        Self::SchedulesOverride
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_active_round_trip() {
        for fa in [
            FillerActive::Category(7),
            FillerActive::Sequence(3),
            FillerActive::ComingSoon("grid".to_string()),
        ] {
            assert_eq!(FillerActive::decode(&fa.encode()), Some(fa));
        }
        assert_eq!(FillerActive::decode("bogus"), None);
        assert_eq!(FillerActive::decode("category:notanid"), None);
    }

    #[test]
    fn mappings_skip_incomplete_entries() {
        let setting = Setting {
            path_mappings: Some(
                r#"[{"local":"D:\\Media","plex":"Z:\\Media"},{"local":"","plex":"/x"}]"#
                    .to_string(),
            ),
            ..Setting::default()
        };
        let mappings = setting.mappings();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].local, "D:\\Media");
    }
}
