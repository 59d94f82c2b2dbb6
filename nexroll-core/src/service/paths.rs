//! Path translation between the engine's filesystem view and the media
//! server's
//!
//! Longest-prefix rewrite over the configured mappings, then a platform
//! style preflight: a value that does not look native to the server's
//! platform is refused before anything is sent.

use crate::models::PathMapping;

/// Structured refusal from the platform preflight, surfaced to the operator
/// with the first offending path so they can add a mapping.
#[derive(Debug, Clone)]
pub struct StyleMismatch {
    pub target_platform: String,
    pub example: String,
}

impl StyleMismatch {
    pub fn message(&self) -> String {
        format!(
            "path style does not match the server platform '{}'; example: {}; add a path mapping \
             translating this prefix to a path the server understands",
            self.target_platform, self.example
        )
    }
}

#[derive(Debug, Clone)]
pub struct PathTranslator {
    mappings: Vec<PathMapping>,
    /// Prefix comparison ignores case on Windows engine hosts.
    case_insensitive: bool,
}

impl PathTranslator {
    pub fn new(mappings: Vec<PathMapping>) -> Self {
        Self {
            mappings,
            case_insensitive: cfg!(windows),
        }
    }

    pub fn with_case_insensitive(mappings: Vec<PathMapping>, case_insensitive: bool) -> Self {
        Self {
            mappings,
            case_insensitive,
        }
    }

    /// Rewrite one local path through the longest matching mapping prefix.
    /// The separator style of the output follows the mapping target; an
    /// unmatched path passes through unchanged.
    pub fn translate(&self, local_path: &str) -> String {
        let mut best: Option<&PathMapping> = None;
        let mut best_len = 0usize;
        for mapping in &self.mappings {
            let matches = if self.case_insensitive {
                local_path.to_lowercase().starts_with(&mapping.local.to_lowercase())
            } else {
                local_path.starts_with(&mapping.local)
            };
            if matches && mapping.local.len() > best_len {
                best = Some(mapping);
                best_len = mapping.local.len();
            }
        }
        let Some(mapping) = best else {
            return local_path.to_string();
        };

        let rest = local_path
            .get(mapping.local.len()..)
            .unwrap_or("")
            .trim_start_matches(['\\', '/']);
        let target = mapping.plex.as_str();
        if target.contains('/') && !target.contains('\\') {
            format!("{}/{}", target.trim_end_matches('/'), rest.replace('\\', "/"))
        } else if target.contains('\\') {
            format!("{}\\{}", target.trim_end_matches('\\'), rest.replace('/', "\\"))
        } else {
            format!("{}/{}", target.trim_end_matches('/'), rest.replace('\\', "/"))
        }
    }

    pub fn translate_all(&self, paths: &[String]) -> Vec<String> {
        paths.iter().map(|p| self.translate(p)).collect()
    }
}

pub fn looks_windows_path(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s.starts_with("\\\\") {
        return true;
    }
    let bytes = s.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

pub fn looks_posix_path(s: &str) -> bool {
    !s.is_empty() && !looks_windows_path(s) && s.starts_with('/')
}

/// Refuse translated paths whose style cannot be native on the server's
/// platform. Never sends a mismatched value to the server.
pub fn validate_platform_style(
    paths: &[String],
    platform: Option<&str>,
) -> Result<(), StyleMismatch> {
    let platform = platform.unwrap_or("").to_lowercase();
    let target_windows = platform.contains("win");
    for path in paths {
        let mismatch = if target_windows {
            looks_posix_path(path)
        } else {
            looks_windows_path(path)
        };
        if mismatch {
            return Err(StyleMismatch {
                target_platform: if platform.is_empty() {
                    "unknown".to_string()
                } else {
                    platform
                },
                example: path.clone(),
            });
        }
    }
    Ok(())
}

/// The Plex wire syntax has no escaping; a separator inside a file name
/// cannot be represented, so such paths are refused at apply time.
pub fn find_delimiter_conflict(paths: &[String]) -> Option<&String> {
    paths.iter().find(|p| p.contains(';') || p.contains(','))
}
