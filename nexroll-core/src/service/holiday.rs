//! Holiday date lookup
//!
//! Resolves variable-date holidays (Thanksgiving, Easter, ...) through a
//! public-holiday API. Results are cached per `(name, country, year)` for
//! the process lifetime; the answer cannot change within a year. A lookup
//! that succeeds but finds no match caches `None` so the API is not
//! re-hammered every tick; transport errors are not cached and retry on the
//! next tick.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::HolidayApiConfig;

#[derive(Debug, Deserialize)]
struct HolidayEntry {
    date: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "localName")]
    local_name: String,
}

pub struct HolidayService {
    client: Client,
    base_url: String,
    cache: Mutex<HashMap<(String, String, i32), Option<(u32, u32)>>>,
}

impl HolidayService {
    pub fn new(config: &HolidayApiConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// `(month, day)` of a named holiday in `year`, or None when the API
    /// does not know it.
    pub async fn holiday_date(
        &self,
        name: &str,
        country: &str,
        year: i32,
    ) -> Option<(u32, u32)> {
        let key = (name.to_lowercase(), country.to_uppercase(), year);
        if let Some(cached) = self.cache.lock().get(&key) {
            return *cached;
        }

        let holidays = match self.fetch(&key.1, year).await {
            Ok(holidays) => holidays,
            Err(e) => {
                warn!("holiday lookup for {country} {year} failed: {e}");
                return None;
            }
        };

        let needle = key.0.clone();
        let resolved = holidays.iter().find_map(|h| {
            let matches = h.name.to_lowercase().contains(&needle)
                || h.local_name.to_lowercase().contains(&needle);
            if !matches {
                return None;
            }
            let date: NaiveDate = h.date.parse().ok()?;
            Some((date.month(), date.day()))
        });

        match resolved {
            Some((month, day)) => {
                info!("resolved holiday '{name}' in {country} {year}: {month:02}-{day:02}");
            }
            None => {
                warn!("holiday '{name}' not found in {country} {year}");
            }
        }
        self.cache.lock().insert(key, resolved);
        resolved
    }

    async fn fetch(&self, country: &str, year: i32) -> Result<Vec<HolidayEntry>, reqwest::Error> {
        self.client
            .get(format!(
                "{}/api/v3/PublicHolidays/{year}/{country}",
                self.base_url
            ))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    #[cfg(test)]
    pub fn seed(&self, name: &str, country: &str, year: i32, value: Option<(u32, u32)>) {
        self.cache
            .lock()
            .insert((name.to_lowercase(), country.to_uppercase(), year), value);
    }
}
