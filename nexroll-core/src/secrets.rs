//! Secure token resolution
//!
//! Media-server tokens never land in the settings row. They resolve, in
//! order, from the loaded config, the documented environment variables, and
//! secret files mounted the way container runtimes deliver them.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::Config;

const PLEX_TOKEN_FILES: &[&str] = &["/run/secrets/nexroll_plex_token", "secrets/plex_token"];
const JELLYFIN_KEY_FILES: &[&str] = &[
    "/run/secrets/nexroll_jellyfin_api_key",
    "secrets/jellyfin_api_key",
];

fn from_file(path: &str) -> Option<String> {
    if !Path::new(path).exists() {
        return None;
    }
    let contents = fs::read_to_string(path).ok()?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        None
    } else {
        debug!("loaded secret from {path}");
        Some(trimmed.to_string())
    }
}

fn from_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn resolve(config_value: Option<&str>, env_name: &str, files: &[&str]) -> Option<String> {
    if let Some(v) = config_value.filter(|v| !v.is_empty()) {
        return Some(v.to_string());
    }
    if let Some(v) = from_env(env_name) {
        return Some(v);
    }
    files.iter().find_map(|path| from_file(path))
}

pub fn plex_token(config: &Config) -> Option<String> {
    resolve(
        config.plex.token.as_deref(),
        "NEXROLL_PLEX_TOKEN",
        PLEX_TOKEN_FILES,
    )
}

pub fn jellyfin_api_key(config: &Config) -> Option<String> {
    resolve(
        config.jellyfin.api_key.as_deref(),
        "NEXROLL_JELLYFIN_API_KEY",
        JELLYFIN_KEY_FILES,
    )
}
