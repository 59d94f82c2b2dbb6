pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod repository;
pub mod secrets;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};

/// The engine's clock: schedules are naive local datetimes by intent, so
/// every comparison goes through this single helper. Conversions to other
/// zones happen only at the edges (webhook payloads, holiday API).
pub fn now_local() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}
