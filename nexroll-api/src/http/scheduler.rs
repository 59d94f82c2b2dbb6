//! Scheduler lifecycle control

use axum::{extract::State, Json};
use serde_json::{json, Value};

use nexroll_core::service::EngineStatus;

use super::{AppResult, AppState};

pub async fn start(State(state): State<AppState>) -> Json<Value> {
    let started = state.engine.clone().start();
    Json(json!({
        "running": true,
        "started": started,
    }))
}

pub async fn stop(State(state): State<AppState>) -> Json<Value> {
    let stopped = state.engine.stop();
    Json(json!({
        "running": false,
        "stopped": stopped,
    }))
}

pub async fn status(State(state): State<AppState>) -> AppResult<Json<EngineStatus>> {
    Ok(Json(state.engine.status().await))
}

/// Run one full tick immediately, outside the timer cadence.
pub async fn run_now(State(state): State<AppState>) -> Json<Value> {
    state.engine.run_tick().await;
    Json(json!({ "ran": true }))
}
