//! Startup wiring: configuration, database pool, service graph.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    config::Config,
    repository::Repositories,
    service::{Engine, HolidayService},
};

/// Load configuration from the conventional file path (overridable with
/// `NEXROLL_CONFIG`) layered under the environment.
pub fn load_config() -> Result<Config> {
    let path = std::env::var("NEXROLL_CONFIG").unwrap_or_else(|_| "nexroll.toml".to_string());
    Config::load(Some(&path)).context("failed to load configuration")
}

/// Open the SQLite pool, creating the database file on first run.
pub async fn init_database(config: &Config) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.database.path))
        .context("invalid database path")?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(options)
        .await
        .context("failed to open database")?;

    info!("database ready at {}", config.database.path);
    Ok(pool)
}

/// Everything the HTTP layer and the binary need, wired once at startup.
pub struct Services {
    pub repos: Repositories,
    pub engine: Arc<Engine>,
    pub holidays: Arc<HolidayService>,
}

pub fn init_services(pool: SqlitePool, config: Arc<Config>) -> Services {
    let repos = Repositories::new(pool);
    let holidays = Arc::new(HolidayService::new(&config.holiday_api));
    let engine = Engine::new(repos.clone(), config, Arc::clone(&holidays));
    Services {
        repos,
        engine,
        holidays,
    }
}
