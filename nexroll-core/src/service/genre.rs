//! Genre normalisation and playback-driven override state
//!
//! Raw genre labels from Plex metadata get canonicalised (NFKC, separator
//! folding, synonym table) and walked as candidate keys against the genre
//! map. The mutable pieces (the per-ratingKey dedupe window and the recent
//! applications ring) live here behind the engine.

use std::collections::{HashMap, VecDeque};

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::provider::PlexSession;

const RECENT_CAPACITY: usize = 10;

fn synonym(key: &str) -> Option<&'static str> {
    match key {
        "sci fi" | "scifi" => Some("science fiction"),
        "kids and family" | "kids family" => Some("family"),
        _ => None,
    }
}

/// Canonical form of a genre label: NFKC, `&` -> " and ", `/` and `_` to
/// spaces, dash runs collapsed, whitespace collapsed, lowercased, then the
/// synonym table.
pub fn canonical(s: &str) -> String {
    let normalized: String = s.nfkc().collect();
    let expanded = normalized.replace('&', " and ");
    let mut folded = String::with_capacity(expanded.len());
    let mut prev_dash = false;
    for c in expanded.chars() {
        match c {
            '/' | '_' => {
                folded.push(' ');
                prev_dash = false;
            }
            '-' => {
                if !prev_dash {
                    folded.push(' ');
                }
                prev_dash = true;
            }
            c => {
                folded.push(c);
                prev_dash = false;
            }
        }
    }
    let collapsed = folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    match synonym(&collapsed) {
        Some(mapped) => mapped.to_string(),
        None => collapsed,
    }
}

/// Candidate keys for a raw label: the canonical whole, then each component
/// split on " and ", commas, pipes and slashes, unique in order.
pub fn candidates(s: &str) -> Vec<String> {
    let base = canonical(s);
    if base.is_empty() {
        return Vec::new();
    }
    let mut out = vec![base.clone()];
    let marked = base.replace(" and ", "\u{1}");
    for part in marked.split([',', '|', '/', '\u{1}']) {
        let part = part.trim();
        if !part.is_empty() && !out.iter().any(|existing| existing == part) {
            out.push(part.to_string());
        }
    }
    out
}

/// Deduplicate case-insensitively, preserving first-seen order and casing.
pub fn dedupe_genres(genres: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for genre in genres {
        let lowered = genre.to_lowercase();
        if !seen.contains(&lowered) {
            seen.push(lowered);
            out.push(genre);
        }
    }
    out
}

/// The session whose item drives the override: playing wins, then the
/// most-progressed paused session, then whichever has the smallest offset.
pub fn pick_session(sessions: &[PlexSession]) -> Option<&PlexSession> {
    let watchable: Vec<&PlexSession> = sessions
        .iter()
        .filter(|s| {
            !s.rating_key.is_empty()
                && matches!(
                    s.item_type.as_deref(),
                    Some("movie") | Some("episode") | Some("clip") | None
                )
        })
        .collect();

    if let Some(playing) = watchable
        .iter()
        .find(|s| s.state.as_deref() == Some("playing"))
    {
        return Some(playing);
    }
    if let Some(paused) = watchable
        .iter()
        .filter(|s| s.state.as_deref() == Some("paused"))
        .max_by_key(|s| s.view_offset.unwrap_or(0))
    {
        return Some(paused);
    }
    watchable
        .into_iter()
        .min_by_key(|s| s.view_offset.unwrap_or(i64::MAX))
}

/// One recorded genre application, surfaced to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct GenreApplication {
    pub timestamp: NaiveDateTime,
    pub genre: String,
    pub category_name: String,
    pub rating_key: Option<String>,
}

/// Outcome of a genre apply attempt, returned verbatim to webhook callers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenreApplyOutcome {
    Applied {
        genre: String,
        category_name: String,
        category_id: i64,
    },
    NoMatch {
        genres: Vec<String>,
    },
    NoGenres,
    Skipped {
        reason: String,
    },
}

/// Engine-owned genre state: dedupe window and bounded application history.
#[derive(Default)]
pub struct GenreState {
    last_applied: Mutex<HashMap<String, NaiveDateTime>>,
    recent: Mutex<VecDeque<GenreApplication>>,
}

impl GenreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `rating_key` was applied within the TTL window.
    pub fn recently_applied(&self, rating_key: &str, ttl_seconds: i64, now: NaiveDateTime) -> bool {
        let mut map = self.last_applied.lock();
        map.retain(|_, at| (now - *at).num_seconds() < ttl_seconds);
        map.contains_key(rating_key)
    }

    pub fn mark_applied(&self, rating_key: &str, now: NaiveDateTime) {
        self.last_applied.lock().insert(rating_key.to_string(), now);
    }

    pub fn record(&self, application: GenreApplication) {
        let mut recent = self.recent.lock();
        recent.push_back(application);
        while recent.len() > RECENT_CAPACITY {
            recent.pop_front();
        }
    }

    pub fn recent(&self) -> Vec<GenreApplication> {
        self.recent.lock().iter().cloned().collect()
    }
}
