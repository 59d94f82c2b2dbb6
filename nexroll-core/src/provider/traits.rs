//! Media-server adapter capability set
//!
//! The engine depends only on this trait; Plex and Jellyfin are variants.

use async_trait::async_trait;
use serde::Serialize;

use super::ProviderError;

/// Normalized server identity, mainly consumed for the platform path-style
/// preflight.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerInfo {
    pub connected: bool,
    pub name: Option<String>,
    pub version: Option<String>,
    pub platform: Option<String>,
    pub machine_identifier: Option<String>,
}

impl ServerInfo {
    pub fn is_windows(&self) -> bool {
        self.platform
            .as_deref()
            .map(|p| {
                let p = p.to_lowercase();
                p.contains("win")
            })
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Adapter name for log lines ("plex", "jellyfin").
    fn name(&self) -> &'static str;

    /// Best-effort reachability probe; never errors.
    async fn test_connection(&self) -> bool;

    async fn get_server_info(&self) -> Result<ServerInfo, ProviderError>;

    /// Current pre-roll preference as the single wire string.
    async fn get_preroll(&self) -> Result<String, ProviderError>;

    /// Write the pre-roll preference. `Ok(true)` means the value survived a
    /// readback; `Ok(false)` means every setter variant was exhausted without
    /// the server taking the value.
    async fn set_preroll(&self, value: &str) -> Result<bool, ProviderError>;

    /// Confirm the server still carries `expected` (modulo trimming).
    async fn verify(&self, expected: &str) -> Result<bool, ProviderError> {
        let actual = self.get_preroll().await?;
        Ok(actual.trim() == expected.trim())
    }
}
