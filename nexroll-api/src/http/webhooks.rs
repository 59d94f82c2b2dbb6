//! Plex webhook receiver
//!
//! Accepts `application/json` or `multipart/form-data` with a `payload`
//! JSON field. When a webhook secret is configured, the raw body must carry
//! a valid base64 HMAC-SHA1 in `X-Plex-Signature`. Play/resume/start events
//! feed the same genre pipeline the poller uses; everything else is
//! acknowledged and ignored. Replies are 200 with a structured body even on
//! "no match"; only a bad signature or a true internal error deviates.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha1::Sha1;
use tracing::debug;

use nexroll_core::{service::GenreApplyOutcome, Error};

use super::{AppError, AppResult, AppState};

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
    /// Aggressive-intercept hook point; accepted and currently ignored.
    #[serde(default)]
    pub intercept: Option<bool>,
}

fn signature_valid(secret: Option<&str>, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(signature) = headers
        .get("X-Plex-Signature")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
    else {
        return false;
    };
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Pull the `payload` part out of a multipart body. Plex sends exactly one
/// field, so a minimal boundary walk is all the parsing this needs.
fn extract_multipart_payload(body: &str, boundary: &str) -> Option<String> {
    let marker = format!("--{boundary}");
    for part in body.split(&marker) {
        if !part.contains("name=\"payload\"") {
            continue;
        }
        let content = part.split_once("\r\n\r\n").map(|(_, c)| c)?;
        let content = content.trim_end_matches(['\r', '\n', '-']);
        return Some(content.to_string());
    }
    None
}

fn parse_payload(headers: &HeaderMap, body: &[u8]) -> Value {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_lowercase();

    if content_type.contains("multipart/form-data") {
        let boundary = content_type
            .split("boundary=")
            .nth(1)
            .map(|b| b.trim_matches('"').trim().to_string());
        if let Some(boundary) = boundary {
            let text = String::from_utf8_lossy(body);
            if let Some(payload) = extract_multipart_payload(&text, &boundary) {
                return serde_json::from_str(&payload).unwrap_or(Value::Null);
            }
        }
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn outcome_reply(via: &str, result: Result<GenreApplyOutcome, Error>) -> AppResult<Json<Value>> {
    match result {
        Ok(outcome) => {
            let handled = matches!(outcome, GenreApplyOutcome::Applied { .. });
            let detail =
                serde_json::to_value(&outcome).map_err(|e| AppError::internal(e.to_string()))?;
            Ok(Json(json!({ "handled": handled, "via": via, "result": detail })))
        }
        Err(Error::Config(m)) | Err(Error::State(m)) | Err(Error::Conflict(m)) => {
            Ok(Json(json!({ "handled": false, "via": via, "error": m })))
        }
        Err(Error::Server(e)) => Ok(Json(json!({
            "handled": false,
            "via": via,
            "error": e.to_string(),
            "kind": e.kind(),
        }))),
        Err(e) => Err(AppError::from(e)),
    }
}

pub async fn plex_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    if !signature_valid(state.config.webhook.plex_secret.as_deref(), &headers, &body) {
        return Err(AppError::forbidden("invalid Plex webhook signature"));
    }

    let data = parse_payload(&headers, &body);
    let event = data
        .get("event")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_lowercase();
    if !matches!(event.as_str(), "media.play" | "media.resume" | "media.start") {
        return Ok(Json(json!({ "received": true, "ignored": true, "event": event })));
    }

    let metadata = data
        .get("Metadata")
        .or_else(|| data.get("metadata"))
        .cloned()
        .unwrap_or(Value::Null);

    // Most reliable route: the item's rating key
    let rating_key = metadata
        .get("ratingKey")
        .or_else(|| metadata.get("ratingkey"))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|k| !k.trim().is_empty());

    if let Some(key) = rating_key {
        debug!("plex webhook: event={event} ratingKey={key}");
        return outcome_reply(
            "rating_key",
            state.engine.apply_by_rating_key(&key, query.ttl_seconds).await,
        );
    }

    // Fallback: genre tags straight from the payload
    let mut genres: Vec<String> = metadata
        .get("Genre")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|g| g.get("tag").and_then(|t| t.as_str()))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    if let Some(extra) = metadata.get("genres").and_then(|v| v.as_array()) {
        genres.extend(extra.iter().filter_map(|g| g.as_str()).map(String::from));
    }

    if !genres.is_empty() {
        debug!("plex webhook: event={event} via genre tags");
        return outcome_reply(
            "genres",
            state.engine.apply_genres(genres, query.ttl_seconds).await,
        );
    }

    Ok(Json(json!({
        "received": true,
        "ignored": true,
        "reason": "no ratingKey or genres in payload",
    })))
}
