// Module: http
// Management API, webhook receivers and diagnostics over axum

pub mod categories;
pub mod diagnostics;
pub mod error;
pub mod genres;
pub mod holiday_presets;
pub mod prerolls;
pub mod scheduler;
pub mod schedules;
pub mod sequences;
pub mod settings;
pub mod webhooks;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use nexroll_core::{repository::Repositories, service::Engine, Config};

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repos: Repositories,
    pub engine: Arc<Engine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Webhook receivers (the alias path matches Plex's docs)
        .route("/plex/webhook", post(webhooks::plex_webhook))
        .route("/webhooks/plex", post(webhooks::plex_webhook))
        // Categories
        .route("/categories", get(categories::list).post(categories::create))
        .route(
            "/categories/{id}",
            get(categories::get)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route("/categories/{id}/apply", post(categories::apply))
        // Prerolls
        .route("/prerolls", get(prerolls::list).post(prerolls::create))
        .route(
            "/prerolls/{id}",
            get(prerolls::get)
                .put(prerolls::update)
                .delete(prerolls::delete),
        )
        // Schedules
        .route("/schedules", get(schedules::list).post(schedules::create))
        .route("/schedules/active", get(schedules::active))
        .route(
            "/schedules/{id}",
            get(schedules::get)
                .put(schedules::update)
                .delete(schedules::delete),
        )
        // Genre maps and applies
        .route("/genres", get(genres::list).post(genres::create))
        .route("/genres/{id}", delete(genres::delete))
        .route("/genres/apply", post(genres::apply))
        .route("/genres/apply-by-key", get(genres::apply_by_key))
        .route("/genres/recent", get(genres::recent))
        // Holiday presets
        .route(
            "/holiday-presets",
            get(holiday_presets::list).post(holiday_presets::create),
        )
        .route("/holiday-presets/{id}", delete(holiday_presets::delete))
        // Saved sequences
        .route("/sequences", get(sequences::list).post(sequences::create))
        .route(
            "/sequences/{id}",
            get(sequences::get).delete(sequences::delete),
        )
        // Settings
        .route("/settings", get(settings::get).put(settings::update))
        // Scheduler control
        .route("/scheduler/start", post(scheduler::start))
        .route("/scheduler/stop", post(scheduler::stop))
        .route("/scheduler/status", get(scheduler::status))
        .route("/scheduler/run-now", post(scheduler::run_now))
        // Diagnostics
        .route("/health", get(diagnostics::health))
        .route("/plex/probe", get(diagnostics::plex_probe))
        .route("/jellyfin/probe", get(diagnostics::jellyfin_probe))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
