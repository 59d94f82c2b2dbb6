use serde::{Deserialize, Serialize};

/// Playback mode Plex applies to a multi-preroll value.
///
/// `Shuffle` joins paths with `;` (Plex picks one at random per playback),
/// `Playlist` joins with `,` (Plex plays them in order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlexMode {
    Shuffle,
    Playlist,
}

impl PlexMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "shuffle" => Some(Self::Shuffle),
            "playlist" => Some(Self::Playlist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shuffle => "shuffle",
            Self::Playlist => "playlist",
        }
    }

    /// The Plex wire delimiter for this mode.
    pub fn delimiter(&self) -> char {
        match self {
            Self::Shuffle => ';',
            Self::Playlist => ',',
        }
    }
}

impl Default for PlexMode {
    fn default() -> Self {
        Self::Shuffle
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub plex_mode: PlexMode,
    /// UI mirror of "currently applied"; at most one category carries it.
    pub apply_to_plex: bool,
    /// Engine-managed categories (e.g. generated coming-soon lists).
    pub is_system: bool,
}
