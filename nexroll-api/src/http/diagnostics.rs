//! Reachability probes and health

use axum::{extract::State, Json};
use serde_json::{json, Value};

use nexroll_core::provider::{self, MediaServer};

use super::{AppResult, AppState};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn plex_probe(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let setting = state.repos.settings.get().await?;
    let server = match provider::plex_server(&setting, &state.config) {
        Ok(server) => server,
        Err(e) => return Ok(Json(json!({ "connected": false, "error": e.to_string() }))),
    };
    probe(&server).await
}

pub async fn jellyfin_probe(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let setting = state.repos.settings.get().await?;
    let server = match provider::jellyfin_server(&setting, &state.config) {
        Ok(server) => server,
        Err(e) => return Ok(Json(json!({ "connected": false, "error": e.to_string() }))),
    };
    probe(&server).await
}

async fn probe(server: &impl MediaServer) -> AppResult<Json<Value>> {
    if !server.test_connection().await {
        return Ok(Json(json!({ "connected": false })));
    }
    match server.get_server_info().await {
        Ok(info) => {
            let mut body = serde_json::to_value(&info).unwrap_or_else(|_| json!({}));
            if let Some(object) = body.as_object_mut() {
                object.insert("server".to_string(), json!(server.name()));
            }
            Ok(Json(body))
        }
        Err(e) => Ok(Json(json!({
            "connected": true,
            "error": e.to_string(),
            "kind": e.kind(),
        }))),
    }
}
