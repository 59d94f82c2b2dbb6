use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
///
/// Media-server URLs may also be edited at runtime through the settings row;
/// values configured here act as the initial defaults. Tokens are resolved
/// through the secure store (`secrets`), never persisted to the database.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub plex: PlexConfig,
    pub jellyfin: JellyfinConfig,
    pub holiday_api: HolidayApiConfig,
    pub webhook: WebhookConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("logging", &self.logging)
            .field("scheduler", &self.scheduler)
            .field("plex", &self.plex)
            .field("jellyfin", &self.jellyfin)
            .field("holiday_api", &self.holiday_api)
            .field("webhook", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 9393,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path. `:memory:` is accepted for tests.
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "nexroll.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "pretty"
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tick interval in seconds.
    pub interval_seconds: u64,
    /// Re-verification cadence for the reconciler.
    pub verification_interval_seconds: u64,
    /// Rotation cadence for sequences containing random steps.
    pub rotation_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            verification_interval_seconds: 300,
            rotation_interval_seconds: 300,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlexConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    /// Overrides the private-host TLS heuristic when set.
    pub tls_verify: Option<bool>,
}

impl std::fmt::Debug for PlexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlexConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("tls_verify", &self.tls_verify)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JellyfinConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub tls_verify: Option<bool>,
}

impl std::fmt::Debug for JellyfinConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JellyfinConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("tls_verify", &self.tls_verify)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HolidayApiConfig {
    pub base_url: String,
}

impl Default for HolidayApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://date.nager.at".to_string(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// HMAC-SHA1 secret for `X-Plex-Signature` verification. Unset means
    /// signatures are not checked.
    pub plex_secret: Option<String>,
}

impl Config {
    /// Load configuration from an optional file layered under `NEXROLL_`
    /// environment variables, then apply the legacy flat variables the
    /// deployment docs promise (`NEXROLL_PLEX_URL`, `SCHEDULER_INTERVAL`, ...).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("NEXROLL")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.apply_flat_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// The documented single-purpose environment variables take precedence
    /// over both the file and the prefixed overlay.
    fn apply_flat_env(&mut self) {
        if let Ok(v) = std::env::var("NEXROLL_PLEX_URL") {
            if !v.is_empty() {
                self.plex.url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("NEXROLL_PLEX_TOKEN") {
            if !v.is_empty() {
                self.plex.token = Some(v);
            }
        }
        if let Ok(v) = std::env::var("NEXROLL_JELLYFIN_URL") {
            if !v.is_empty() {
                self.jellyfin.url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("NEXROLL_JELLYFIN_API_KEY") {
            if !v.is_empty() {
                self.jellyfin.api_key = Some(v);
            }
        }
        if let Some(v) = bool_env("NEXROLL_PLEX_TLS_VERIFY") {
            self.plex.tls_verify = Some(v);
        }
        if let Some(v) = bool_env("NEXROLL_JELLYFIN_TLS_VERIFY") {
            self.jellyfin.tls_verify = Some(v);
        }
        if let Ok(v) = std::env::var("SCHEDULER_INTERVAL") {
            if let Ok(secs) = v.trim().parse::<u64>() {
                if secs > 0 {
                    self.scheduler.interval_seconds = secs;
                }
            }
        }
        if let Ok(v) = std::env::var("NEXROLL_PLEX_WEBHOOK_SECRET") {
            if !v.is_empty() {
                self.webhook.plex_secret = Some(v);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::Message(
                "scheduler.interval_seconds must be positive".to_string(),
            ));
        }
        if self.database.path.is_empty() {
            return Err(ConfigError::Message(
                "database.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a boolean-ish environment variable (1/0, true/false, on/off, yes/no).
pub fn bool_env(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
