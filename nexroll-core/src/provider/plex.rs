//! Plex adapter
//!
//! Programs the `CinemaTrailersPrerollID` preference over the `:/prefs`
//! endpoint. Plex versions disagree on which write shape they accept, so the
//! setter walks query-string PUT, form PUT, then POST; a variant only counts
//! as applied once the readback returns the exact value.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, Method, RequestBuilder};
use tracing::{debug, warn};

use super::{MediaServer, ProviderError, ServerInfo};

const PREF_KEY: &str = "CinemaTrailersPrerollID";

/// Leave path characters and the two wire delimiters readable; everything
/// else gets percent-encoded.
const PREF_VALUE_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b':')
    .remove(b'/')
    .remove(b'\\')
    .remove(b';')
    .remove(b',')
    .remove(b'.')
    .remove(b'-')
    .remove(b'_');

/// One entry from `/status/sessions` or `/library/metadata/{key}`.
#[derive(Debug, Clone, Default)]
pub struct PlexSession {
    pub rating_key: String,
    pub parent_rating_key: Option<String>,
    pub grandparent_rating_key: Option<String>,
    pub item_type: Option<String>,
    pub view_offset: Option<i64>,
    /// Player state: playing, paused, buffering, ...
    pub state: Option<String>,
    pub genres: Vec<String>,
}

pub struct PlexServer {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl PlexServer {
    pub fn new(url: &str, token: Option<String>, tls_verify: bool) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(!tls_verify)
            .build()
            .map_err(|e| ProviderError::Conn(e.to_string()))?;
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header("X-Plex-Token", token);
        }
        builder
    }

    async fn fetch_prefs_xml(&self) -> Result<String, ProviderError> {
        let response = self
            .request(Method::GET, format!("{}/:/prefs", self.base_url))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16()));
        }
        let body = response.text().await?;
        if body.is_empty() {
            return Err(ProviderError::Protocol("empty preferences body".to_string()));
        }
        Ok(body)
    }

    async fn readback_matches(&self, expected: &str) -> bool {
        match self.get_preroll().await {
            Ok(actual) => actual.trim() == expected.trim(),
            Err(e) => {
                warn!("plex: readback failed: {e}");
                false
            }
        }
    }

    /// Current playback sessions. Plex answers XML or JSON depending on the
    /// server build; both carry the same shape.
    pub async fn sessions(&self) -> Result<Vec<PlexSession>, ProviderError> {
        let response = self
            .request(Method::GET, format!("{}/status/sessions", self.base_url))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16()));
        }
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let body = response.text().await?;
        if body.is_empty() {
            return Err(ProviderError::Protocol("empty sessions body".to_string()));
        }
        if is_json {
            parse_sessions_json(&body)
        } else {
            parse_video_container(&body)
        }
    }

    /// Metadata for one item, primarily its `Genre` tags.
    pub async fn metadata(&self, rating_key: &str) -> Result<Option<PlexSession>, ProviderError> {
        let response = self
            .request(
                Method::GET,
                format!(
                    "{}/library/metadata/{rating_key}?includeChildren=1",
                    self.base_url
                ),
            )
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16()));
        }
        let body = response.text().await?;
        if body.is_empty() {
            return Err(ProviderError::Protocol("empty metadata body".to_string()));
        }
        Ok(parse_video_container(&body)?.into_iter().next())
    }
}

#[async_trait]
impl MediaServer for PlexServer {
    fn name(&self) -> &'static str {
        "plex"
    }

    async fn test_connection(&self) -> bool {
        match self.request(Method::GET, format!("{}/", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn get_server_info(&self) -> Result<ServerInfo, ProviderError> {
        let response = self
            .request(Method::GET, format!("{}/", self.base_url))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(parse_server_info(&body))
    }

    async fn get_preroll(&self) -> Result<String, ProviderError> {
        let xml = self.fetch_prefs_xml().await?;
        Ok(parse_pref_value(&xml, PREF_KEY).unwrap_or_default())
    }

    async fn set_preroll(&self, value: &str) -> Result<bool, ProviderError> {
        let prefs_url = format!("{}/:/prefs", self.base_url);
        let encoded = utf8_percent_encode(value, PREF_VALUE_ENCODE).to_string();
        let mut last_transport: Option<ProviderError> = None;

        // Variant 1: PUT with query parameters
        match self
            .request(Method::PUT, format!("{prefs_url}?{PREF_KEY}={encoded}"))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                if self.readback_matches(value).await {
                    return Ok(true);
                }
                debug!("plex: query PUT accepted but value did not stick; trying form PUT");
            }
            Ok(response) => {
                debug!("plex: query PUT returned {}", response.status());
            }
            Err(e) => last_transport = Some(e.into()),
        }

        // Variant 2: PUT with form body
        match self
            .request(Method::PUT, prefs_url.clone())
            .form(&[(PREF_KEY, value)])
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                if self.readback_matches(value).await {
                    return Ok(true);
                }
                debug!("plex: form PUT accepted but value did not stick; trying POST");
            }
            Ok(response) => {
                debug!("plex: form PUT returned {}", response.status());
            }
            Err(e) => last_transport = Some(e.into()),
        }

        // Variant 3: POST with query parameters
        match self
            .request(Method::POST, format!("{prefs_url}?{PREF_KEY}={encoded}"))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                if self.readback_matches(value).await {
                    return Ok(true);
                }
                warn!("plex: POST accepted but readback does not match");
            }
            Ok(response) => {
                debug!("plex: POST returned {}", response.status());
            }
            Err(e) => last_transport = Some(e.into()),
        }

        match last_transport {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }
}

/// Extract one `<Setting id=... value=.../>` value from a preferences
/// document.
fn parse_pref_value(xml: &str, pref: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"Setting" {
                    continue;
                }
                let mut id = None;
                let mut value = None;
                for attr in e.attributes().flatten() {
                    match attr.key.local_name().as_ref() {
                        b"id" => id = attr.unescape_value().ok().map(|v| v.into_owned()),
                        b"value" => value = attr.unescape_value().ok().map(|v| v.into_owned()),
                        _ => {}
                    }
                }
                if id.as_deref() == Some(pref) {
                    return Some(value.unwrap_or_default());
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn parse_server_info(xml: &str) -> ServerInfo {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() != b"MediaContainer" {
                    continue;
                }
                let mut info = ServerInfo {
                    connected: true,
                    ..ServerInfo::default()
                };
                for attr in e.attributes().flatten() {
                    let value = match attr.unescape_value() {
                        Ok(v) => v.into_owned(),
                        Err(_) => continue,
                    };
                    match attr.key.local_name().as_ref() {
                        b"friendlyName" => info.name = Some(value),
                        b"version" => info.version = Some(value),
                        b"platform" => info.platform = Some(value),
                        b"machineIdentifier" => info.machine_identifier = Some(value),
                        _ => {}
                    }
                }
                return info;
            }
            Ok(Event::Eof) | Err(_) => {
                // Unparseable body from a 200 still means the server answered
                return ServerInfo {
                    connected: true,
                    ..ServerInfo::default()
                };
            }
            _ => {}
        }
    }
}

fn session_from_attrs(e: &quick_xml::events::BytesStart<'_>) -> PlexSession {
    let mut session = PlexSession::default();
    for attr in e.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match attr.key.local_name().as_ref() {
            b"ratingKey" => session.rating_key = value,
            b"parentRatingKey" => session.parent_rating_key = Some(value),
            b"grandparentRatingKey" => session.grandparent_rating_key = Some(value),
            b"type" => session.item_type = Some(value),
            b"viewOffset" => session.view_offset = value.parse().ok(),
            _ => {}
        }
    }
    session
}

/// Parse `<Video>` entries (sessions and metadata share the shape) with their
/// `Player` state and `Genre` tags.
fn parse_video_container(xml: &str) -> Result<Vec<PlexSession>, ProviderError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut sessions = Vec::new();
    let mut current: Option<PlexSession> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"Video" => current = Some(session_from_attrs(&e)),
                b"Player" | b"Genre" => attach_child(&mut current, &e),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"Video" => sessions.push(session_from_attrs(&e)),
                b"Player" | b"Genre" => attach_child(&mut current, &e),
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"Video" {
                    if let Some(session) = current.take() {
                        sessions.push(session);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ProviderError::Protocol(format!("bad XML: {e}"))),
            _ => {}
        }
    }
    Ok(sessions)
}

fn attach_child(current: &mut Option<PlexSession>, e: &quick_xml::events::BytesStart<'_>) {
    let Some(session) = current.as_mut() else {
        return;
    };
    let is_player = e.local_name().as_ref() == b"Player";
    for attr in e.attributes().flatten() {
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => continue,
        };
        match (is_player, attr.key.local_name().as_ref()) {
            (true, b"state") => session.state = Some(value.to_lowercase()),
            (false, b"tag") => {
                if !value.trim().is_empty() {
                    session.genres.push(value.trim().to_string());
                }
            }
            _ => {}
        }
    }
}

fn parse_sessions_json(body: &str) -> Result<Vec<PlexSession>, ProviderError> {
    let root: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Protocol(format!("bad JSON: {e}")))?;
    let entries = root
        .pointer("/MediaContainer/Metadata")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let as_string = |v: &serde_json::Value| -> Option<String> {
        match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    Ok(entries
        .iter()
        .map(|entry| PlexSession {
            rating_key: entry.get("ratingKey").and_then(as_string).unwrap_or_default(),
            parent_rating_key: entry.get("parentRatingKey").and_then(as_string),
            grandparent_rating_key: entry.get("grandparentRatingKey").and_then(as_string),
            item_type: entry.get("type").and_then(as_string),
            view_offset: entry.get("viewOffset").and_then(|v| v.as_i64()),
            state: entry
                .pointer("/Player/state")
                .and_then(|v| v.as_str())
                .map(|s| s.to_lowercase()),
            genres: entry
                .get("Genre")
                .and_then(|v| v.as_array())
                .map(|tags| {
                    tags.iter()
                        .filter_map(|t| t.get("tag").and_then(|v| v.as_str()))
                        .map(|s| s.to_string())
                        .collect()
                })
                .unwrap_or_default(),
        })
        .filter(|s| !s.rating_key.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <MediaContainer size="3">
            <Setting id="FriendlyName" value="den" />
            <Setting id="CinemaTrailersPrerollID" value="Z:\Media\a.mp4;Z:\Media\b.mp4" />
        </MediaContainer>"#;

    #[test]
    fn pref_value_found() {
        assert_eq!(
            parse_pref_value(PREFS_XML, "CinemaTrailersPrerollID").as_deref(),
            Some(r"Z:\Media\a.mp4;Z:\Media\b.mp4")
        );
        assert_eq!(parse_pref_value(PREFS_XML, "DoesNotExist"), None);
    }

    #[test]
    fn server_info_platform() {
        let xml = r#"<MediaContainer friendlyName="den" version="1.40" platform="Windows" machineIdentifier="abc"/>"#;
        let info = parse_server_info(xml);
        assert!(info.connected);
        assert_eq!(info.platform.as_deref(), Some("Windows"));
        assert!(info.is_windows());
    }

    #[test]
    fn sessions_xml_with_player_and_genres() {
        let xml = r#"<MediaContainer size="1">
            <Video ratingKey="101" type="movie" viewOffset="5000" parentRatingKey="90">
                <Player state="Playing" machineIdentifier="m1"/>
                <Genre tag="Horror"/>
                <Genre tag="Thriller"/>
            </Video>
        </MediaContainer>"#;
        let sessions = parse_video_container(xml).unwrap();
        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.rating_key, "101");
        assert_eq!(s.state.as_deref(), Some("playing"));
        assert_eq!(s.view_offset, Some(5000));
        assert_eq!(s.parent_rating_key.as_deref(), Some("90"));
        assert_eq!(s.genres, vec!["Horror", "Thriller"]);
    }

    #[test]
    fn sessions_json_shape() {
        let body = r#"{"MediaContainer":{"Metadata":[
            {"ratingKey":"7","type":"episode","viewOffset":1200,
             "grandparentRatingKey":"3",
             "Player":{"state":"paused"},
             "Genre":[{"tag":"Comedy"}]}
        ]}}"#;
        let sessions = parse_sessions_json(body).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].rating_key, "7");
        assert_eq!(sessions[0].state.as_deref(), Some("paused"));
        assert_eq!(sessions[0].grandparent_rating_key.as_deref(), Some("3"));
        assert_eq!(sessions[0].genres, vec!["Comedy"]);
    }

    #[test]
    fn empty_video_element_still_counts() {
        let xml = r#"<MediaContainer><Video ratingKey="5" type="movie"/></MediaContainer>"#;
        let sessions = parse_video_container(xml).unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].genres.is_empty());
    }
}
