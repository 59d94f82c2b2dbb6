// Media-server adapters
//
// The engine depends on the `MediaServer` capability set; Plex and Jellyfin
// are the two variants. Adapters are constructed per apply from the current
// settings row so runtime URL edits take effect without a restart.

pub mod error;
pub mod jellyfin;
pub mod plex;
pub mod tls;
pub mod traits;

pub use error::ProviderError;
pub use jellyfin::JellyfinServer;
pub use plex::{PlexServer, PlexSession};
pub use tls::infer_tls_verify;
pub use traits::{MediaServer, ServerInfo};

use std::sync::Arc;

use crate::{config::Config, models::Setting, secrets};

/// Build the Plex adapter from runtime settings, falling back to the static
/// config for the URL. Tokens come from the secure store only.
pub fn plex_server(setting: &Setting, config: &Config) -> Result<PlexServer, ProviderError> {
    let url = setting
        .plex_url
        .as_deref()
        .or(config.plex.url.as_deref())
        .ok_or_else(|| ProviderError::NotConfigured("Plex URL is not set".to_string()))?;
    let verify = infer_tls_verify(Some(url), config.plex.tls_verify);
    PlexServer::new(url, secrets::plex_token(config), verify)
}

pub fn jellyfin_server(
    setting: &Setting,
    config: &Config,
) -> Result<JellyfinServer, ProviderError> {
    let url = setting
        .jellyfin_url
        .as_deref()
        .or(config.jellyfin.url.as_deref())
        .ok_or_else(|| ProviderError::NotConfigured("Jellyfin URL is not set".to_string()))?;
    let verify = infer_tls_verify(Some(url), config.jellyfin.tls_verify);
    JellyfinServer::new(url, secrets::jellyfin_api_key(config), verify)
}

/// The adapter the decision loop programs. Plex wins when both servers are
/// configured; Jellyfin is the fallback target.
pub fn active_server(
    setting: &Setting,
    config: &Config,
) -> Result<Arc<dyn MediaServer>, ProviderError> {
    if setting.plex_url.is_some() || config.plex.url.is_some() {
        return Ok(Arc::new(plex_server(setting, config)?));
    }
    if setting.jellyfin_url.is_some() || config.jellyfin.url.is_some() {
        return Ok(Arc::new(jellyfin_server(setting, config)?));
    }
    Err(ProviderError::NotConfigured(
        "no media server configured (set a Plex or Jellyfin URL)".to_string(),
    ))
}
