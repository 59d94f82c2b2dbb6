//! Jellyfin adapter
//!
//! Jellyfin has no native pre-roll preference; the adapter targets the
//! "Local Intros" plugin instead. The configured value is the set of parent
//! directories of the translated paths, since the plugin scans folders
//! rather than taking files.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use super::{MediaServer, ProviderError, ServerInfo};

/// Config keys the plugin ecosystem has shipped under, in preference order.
const LIST_KEYS: &[&str] = &[
    "IntroPaths",
    "Paths",
    "PrerollPaths",
    "Folders",
    "Directories",
    "IntroFolders",
    "FolderPaths",
];
const STRING_KEYS: &[&str] = &[
    "Path",
    "IntroPath",
    "Folder",
    "Directory",
    "IntroFolder",
    "Root",
    "BasePath",
];

pub struct JellyfinServer {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl JellyfinServer {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        tls_verify: bool,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(!tls_verify)
            .build()
            .map_err(|e| ProviderError::Conn(e.to_string()))?;
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder
                .header("X-Emby-Token", key)
                .header("X-MediaBrowser-Token", key);
        }
        builder
    }

    async fn get_json(&self, path: &str) -> Result<Value, ProviderError> {
        let response = self.request(Method::GET, path).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16()));
        }
        let body = response.text().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ProviderError::Protocol(format!("bad JSON: {e}")))
    }

    /// Locate the Local Intros plugin by case-insensitive name substring,
    /// from the most to the least specific needle.
    pub async fn find_intros_plugin(&self) -> Result<Option<(String, String)>, ProviderError> {
        let plugins = self.get_json("/Plugins").await?;
        let list = plugins.as_array().cloned().unwrap_or_default();
        for needle in ["local intros", "intros", "intro"] {
            for plugin in &list {
                let name = plugin
                    .get("Name")
                    .or_else(|| plugin.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if name.to_lowercase().contains(needle) {
                    let id = plugin
                        .get("Id")
                        .or_else(|| plugin.get("id"))
                        .or_else(|| plugin.get("Guid"))
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    if !id.is_empty() {
                        return Ok(Some((id.to_string(), name.to_string())));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn plugin_configuration(&self, plugin_id: &str) -> Result<Value, ProviderError> {
        let cfg = self
            .get_json(&format!("/Plugins/{plugin_id}/Configuration"))
            .await?;
        Ok(if cfg.is_object() { cfg } else { json!({}) })
    }

    async fn set_plugin_configuration(
        &self,
        plugin_id: &str,
        config: &Value,
    ) -> Result<bool, ProviderError> {
        let response = self
            .request(Method::POST, &format!("/Plugins/{plugin_id}/Configuration"))
            .json(config)
            .send()
            .await?;
        Ok(matches!(response.status().as_u16(), 200 | 202 | 204))
    }
}

#[async_trait]
impl MediaServer for JellyfinServer {
    fn name(&self) -> &'static str {
        "jellyfin"
    }

    async fn test_connection(&self) -> bool {
        if let Ok(response) = self.request(Method::GET, "/System/Info/Public").send().await {
            if response.status().is_success() {
                return true;
            }
        }
        match self.request(Method::GET, "/System/Ping").send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn get_server_info(&self) -> Result<ServerInfo, ProviderError> {
        let data = self.get_json("/System/Info/Public").await?;
        Ok(ServerInfo {
            connected: true,
            name: data
                .get("ServerName")
                .and_then(|v| v.as_str())
                .map(String::from),
            version: data
                .get("Version")
                .and_then(|v| v.as_str())
                .map(String::from),
            platform: data
                .get("OperatingSystem")
                .and_then(|v| v.as_str())
                .map(String::from),
            machine_identifier: data.get("Id").and_then(|v| v.as_str()).map(String::from),
        })
    }

    async fn get_preroll(&self) -> Result<String, ProviderError> {
        let Some((plugin_id, _)) = self.find_intros_plugin().await? else {
            return Ok(String::new());
        };
        let cfg = self.plugin_configuration(&plugin_id).await?;
        for key in LIST_KEYS {
            if let Some(list) = cfg.get(*key).and_then(|v| v.as_array()) {
                let paths: Vec<&str> = list.iter().filter_map(|v| v.as_str()).collect();
                return Ok(paths.join(";"));
            }
        }
        for key in STRING_KEYS {
            if let Some(s) = cfg.get(*key).and_then(|v| v.as_str()) {
                return Ok(s.to_string());
            }
        }
        Ok(String::new())
    }

    async fn set_preroll(&self, value: &str) -> Result<bool, ProviderError> {
        let Some((plugin_id, plugin_name)) = self.find_intros_plugin().await? else {
            return Err(ProviderError::NotConfigured(
                "Local Intros plugin not found on this Jellyfin server; install or enable it"
                    .to_string(),
            ));
        };
        debug!("jellyfin: targeting plugin '{plugin_name}' ({plugin_id})");

        let directories = parent_directories(value);
        let mut cfg = self.plugin_configuration(&plugin_id).await?;
        let object = cfg
            .as_object_mut()
            .ok_or_else(|| ProviderError::Protocol("plugin configuration is not an object".to_string()))?;

        let mut target_list = None;
        for key in LIST_KEYS {
            if object.get(*key).map(Value::is_array).unwrap_or(false) {
                target_list = Some(*key);
                break;
            }
        }
        let mut target_string = None;
        if target_list.is_none() {
            for key in STRING_KEYS {
                if object.get(*key).map(Value::is_string).unwrap_or(false) {
                    target_string = Some(*key);
                    break;
                }
            }
        }

        if let Some(first) = directories.first() {
            object.insert("Local".to_string(), json!(first));
        }
        match (target_list, target_string) {
            (Some(key), _) => {
                object.insert(key.to_string(), json!(directories));
            }
            (None, Some(key)) => {
                object.insert(
                    key.to_string(),
                    json!(directories.first().cloned().unwrap_or_default()),
                );
            }
            (None, None) => {
                // No recognised key in the shipped config; force the common one
                object.insert("IntroPaths".to_string(), json!(directories));
            }
        }

        self.set_plugin_configuration(&plugin_id, &cfg).await
    }

    /// The plugin stores directories, not the exact string we derived it
    /// from, so equality against the original value is meaningless.
    async fn verify(&self, expected: &str) -> Result<bool, ProviderError> {
        let expected_dirs = parent_directories(expected);
        let actual = self.get_preroll().await?;
        let actual_dirs: Vec<String> = actual
            .split(';')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(expected_dirs == actual_dirs)
    }
}

/// Unique parent directories of the paths in a wire value, original order
/// preserved. Accepts both delimiters and both path styles.
fn parent_directories(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in value.split([';', ',']) {
        let trimmed = path.trim().trim_end_matches(['/', '\\']);
        if trimmed.is_empty() {
            continue;
        }
        let parent = match trimmed.rfind(['/', '\\']) {
            Some(idx) if idx > 0 => &trimmed[..idx],
            _ => continue,
        };
        if !out.iter().any(|d| d == parent) {
            out.push(parent.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_directories_dedupe_and_keep_order() {
        let value = "/media/intros/a.mp4;/media/intros/b.mp4;/media/other/c.mp4";
        assert_eq!(
            parent_directories(value),
            vec!["/media/intros".to_string(), "/media/other".to_string()]
        );
    }

    #[test]
    fn parent_directories_handle_windows_paths() {
        let value = r"Z:\Media\Intros\a.mp4,Z:\Media\Intros\b.mp4";
        assert_eq!(parent_directories(value), vec![r"Z:\Media\Intros".to_string()]);
    }

    #[test]
    fn parent_directories_skip_bare_names() {
        assert!(parent_directories("a.mp4;b.mp4").is_empty());
        assert!(parent_directories("").is_empty());
    }
}
