use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Monthly,
    Yearly,
    Holiday,
    HolidayDynamic,
    Custom,
}

impl ScheduleKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            "holiday" => Some(Self::Holiday),
            "holiday_dynamic" => Some(Self::HolidayDynamic),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Holiday => "holiday",
            Self::HolidayDynamic => "holiday_dynamic",
            Self::Custom => "custom",
        }
    }
}

/// Time-of-day window in "HH:MM". A missing `end` means end-of-day (23:59).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

impl TimeRange {
    /// Parse "HH:MM" into minute-of-day. Returns None on malformed input.
    pub fn parse_minutes(s: &str) -> Option<u32> {
        let mut parts = s.splitn(2, ':');
        let hour: u32 = parts.next()?.trim().parse().ok()?;
        let minute: u32 = match parts.next() {
            Some(m) => m.trim().parse().ok()?,
            None => 0,
        };
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(hour * 60 + minute)
    }

    pub fn start_minutes(&self) -> Option<u32> {
        Self::parse_minutes(&self.start)
    }

    pub fn end_minutes(&self) -> u32 {
        self.end
            .as_deref()
            .and_then(Self::parse_minutes)
            .unwrap_or(23 * 60 + 59)
    }
}

/// Recurrence constraints stored as JSON on the schedule row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurrencePattern {
    #[serde(rename = "timeRange", default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    /// Monday = 0 .. Sunday = 6.
    #[serde(rename = "daysOfWeek", default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    /// "holiday_dynamic" marks patterns resolved through the holiday API.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl RecurrencePattern {
    pub fn is_holiday_dynamic(&self) -> bool {
        self.kind.as_deref() == Some("holiday_dynamic")
    }
}

/// One step of an ordered schedule sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SequenceStep {
    /// Draw `count` prerolls uniformly without replacement from a category pool.
    Random { category_id: i64, count: u32 },
    /// Fixed picks, in order. Accepts the legacy single-id form.
    Fixed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preroll_id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preroll_ids: Option<Vec<i64>>,
    },
}

impl SequenceStep {
    pub fn fixed_ids(&self) -> Vec<i64> {
        match self {
            Self::Fixed {
                preroll_id,
                preroll_ids,
            } => match preroll_ids {
                Some(ids) => ids.clone(),
                None => preroll_id.map(|id| vec![id]).unwrap_or_default(),
            },
            Self::Random { .. } => Vec::new(),
        }
    }
}

/// Parse a stored sequence column leniently: steps with unknown tags are
/// skipped so rows written by older builds keep working.
pub fn parse_sequence_lenient(raw: &str) -> Vec<SequenceStep> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };
    values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

/// Parse operator-supplied sequence JSON strictly: any unknown step tag is
/// rejected so bad definitions never reach the store.
pub fn parse_sequence_strict(raw: &serde_json::Value) -> Result<Vec<SequenceStep>> {
    let values = raw
        .as_array()
        .ok_or_else(|| Error::InvalidInput("sequence must be a JSON list".to_string()))?;
    values
        .iter()
        .map(|v| {
            serde_json::from_value(v.clone())
                .map_err(|e| Error::InvalidInput(format!("invalid sequence step: {e}")))
        })
        .collect()
}

/// A time-bound binding of a category (or sequence) to a window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub name: String,
    pub kind: ScheduleKind,
    /// Naive local datetimes; operators think in wall-clock time.
    pub start_date: NaiveDateTime,
    pub end_date: Option<NaiveDateTime>,
    pub category_id: i64,
    pub fallback_category_id: Option<i64>,
    pub shuffle: bool,
    pub playlist: bool,
    /// 0..=10, higher wins. Default 5.
    pub priority: i64,
    pub exclusive: bool,
    pub blend_enabled: bool,
    pub is_active: bool,
    pub recurrence_pattern: Option<String>,
    pub sequence: Option<String>,
    pub last_run: Option<NaiveDateTime>,
    pub next_run: Option<NaiveDateTime>,
}

impl Schedule {
    pub fn pattern(&self) -> Option<RecurrencePattern> {
        self.recurrence_pattern
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn sequence_steps(&self) -> Vec<SequenceStep> {
        self.sequence
            .as_deref()
            .map(parse_sequence_lenient)
            .unwrap_or_default()
    }

    pub fn has_sequence(&self) -> bool {
        !self.sequence_steps().is_empty()
    }

    pub fn has_random_step(&self) -> bool {
        self.sequence_steps()
            .iter()
            .any(|s| matches!(s, SequenceStep::Random { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_parses_hours_and_minutes() {
        assert_eq!(TimeRange::parse_minutes("22:00"), Some(22 * 60));
        assert_eq!(TimeRange::parse_minutes("03:15"), Some(3 * 60 + 15));
        assert_eq!(TimeRange::parse_minutes("9"), Some(9 * 60));
        assert_eq!(TimeRange::parse_minutes("24:00"), None);
        assert_eq!(TimeRange::parse_minutes("10:75"), None);
        assert_eq!(TimeRange::parse_minutes("bogus"), None);
    }

    #[test]
    fn missing_end_defaults_to_end_of_day() {
        let range = TimeRange {
            start: "08:00".to_string(),
            end: None,
        };
        assert_eq!(range.end_minutes(), 23 * 60 + 59);
    }

    #[test]
    fn lenient_parse_skips_unknown_step_types() {
        let raw = r#"[
            {"type":"fixed","preroll_id":10},
            {"type":"warmup","seconds":5},
            {"type":"random","category_id":3,"count":2}
        ]"#;
        let steps = parse_sequence_lenient(raw);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].fixed_ids(), vec![10]);
        assert!(matches!(
            steps[1],
            SequenceStep::Random {
                category_id: 3,
                count: 2
            }
        ));
    }

    #[test]
    fn strict_parse_rejects_unknown_step_types() {
        let raw = serde_json::json!([
            {"type": "fixed", "preroll_ids": [1, 2]},
            {"type": "warmup", "seconds": 5}
        ]);
        assert!(parse_sequence_strict(&raw).is_err());

        let good = serde_json::json!([
            {"type": "fixed", "preroll_ids": [1, 2]},
            {"type": "random", "category_id": 4, "count": 1}
        ]);
        assert_eq!(parse_sequence_strict(&good).unwrap().len(), 2);
    }

    #[test]
    fn pattern_round_trip() {
        let raw = r#"{"timeRange":{"start":"22:00","end":"03:00"},"daysOfWeek":[5,6]}"#;
        let pattern: RecurrencePattern = serde_json::from_str(raw).unwrap();
        let range = pattern.time_range.as_ref().unwrap();
        assert_eq!(range.start_minutes(), Some(22 * 60));
        assert_eq!(range.end_minutes(), 3 * 60);
        assert_eq!(pattern.days_of_week.as_deref(), Some(&[5u8, 6u8][..]));
        assert!(!pattern.is_holiday_dynamic());
    }
}
