//! Schedule window evaluation
//!
//! `is_active` is a pure function of the schedule, the clock, and the
//! pre-resolved holiday data; the engine resolves holiday dates up front so
//! evaluation itself never does I/O.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::models::{HolidayPreset, Schedule, ScheduleKind};

/// Holiday input for one schedule, resolved by the engine before evaluation.
#[derive(Debug, Clone)]
pub enum HolidayResolution {
    /// Not a holiday schedule; dates alone decide.
    NotApplicable,
    /// `holiday_dynamic`: the API resolved this year's date.
    Date { month: u32, day: u32 },
    /// `holiday`: the preset window linked through the schedule's category.
    Window(HolidayPreset),
    /// `holiday_dynamic` whose lookup produced nothing; never active.
    Unresolved,
}

/// Whether `schedule` is active at `now`.
///
/// Date window first, then the holiday constraint, then time-of-day, then
/// day-of-week. All comparisons are naive local time. A Feb 29 holiday date
/// simply never matches in a non-leap year.
pub fn is_active(schedule: &Schedule, now: NaiveDateTime, holiday: &HolidayResolution) -> bool {
    // Date window: inclusive when bounded, indefinite from start otherwise.
    if now < schedule.start_date {
        return false;
    }
    if let Some(end) = schedule.end_date {
        if now > end {
            return false;
        }
    }

    match holiday {
        HolidayResolution::NotApplicable => {}
        HolidayResolution::Date { month, day } => {
            if now.month() != *month || now.day() != *day {
                return false;
            }
        }
        HolidayResolution::Window(preset) => {
            if !preset.contains(now.month(), now.day()) {
                return false;
            }
        }
        HolidayResolution::Unresolved => return false,
    }

    let Some(pattern) = schedule.pattern() else {
        return true;
    };

    if let Some(range) = &pattern.time_range {
        // A malformed start falls back to date-only activation.
        if let Some(start_val) = range.start_minutes() {
            let end_val = range.end_minutes();
            let current = now.hour() * 60 + now.minute();
            let time_active = if start_val <= end_val {
                (start_val..=end_val).contains(&current)
            } else {
                // Overnight window, e.g. 22:00 -> 03:00
                current >= start_val || current <= end_val
            };
            if !time_active {
                return false;
            }
        }
    }

    if let Some(days) = &pattern.days_of_week {
        if !days.is_empty() {
            let weekday = now.weekday().num_days_from_monday() as u8;
            if !days.contains(&weekday) {
                return false;
            }
        }
    }

    true
}

/// Whether a schedule needs a holiday-API lookup before evaluation.
pub fn needs_holiday_lookup(schedule: &Schedule) -> Option<(String, String)> {
    if schedule.kind != ScheduleKind::HolidayDynamic
        && !schedule.pattern().map(|p| p.is_holiday_dynamic()).unwrap_or(false)
    {
        return None;
    }
    let pattern = schedule.pattern()?;
    Some((pattern.name?, pattern.country.unwrap_or_else(|| "US".to_string())))
}

/// Bookkeeping helper: the next occurrence this schedule is expected to fire.
pub fn next_run(
    schedule: &Schedule,
    preset: Option<&HolidayPreset>,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let at_start_time = |candidate: NaiveDateTime| {
        candidate
            .with_hour(schedule.start_date.hour())
            .and_then(|c| c.with_minute(schedule.start_date.minute()))
            .and_then(|c| c.with_second(0))
    };

    match schedule.kind {
        ScheduleKind::Monthly => {
            let candidate = now.with_day(schedule.start_date.day()).and_then(at_start_time)?;
            if candidate > now {
                Some(candidate)
            } else if now.month() == 12 {
                candidate
                    .with_year(now.year() + 1)
                    .and_then(|c| c.with_month(1))
            } else {
                candidate.with_month(now.month() + 1)
            }
        }
        ScheduleKind::Yearly | ScheduleKind::HolidayDynamic => {
            // Feb 29 anniversaries yield None in non-leap years; the next
            // leap year is not searched for.
            let candidate = schedule.start_date.with_year(now.year())?;
            if candidate > now {
                Some(candidate)
            } else {
                schedule.start_date.with_year(now.year() + 1)
            }
        }
        ScheduleKind::Holiday => {
            let preset = preset?;
            let candidate = now
                .with_month(preset.month)
                .and_then(|c| c.with_day(preset.day))
                .and_then(at_start_time)?;
            if candidate > now {
                Some(candidate)
            } else {
                candidate.with_year(now.year() + 1)
            }
        }
        ScheduleKind::Custom => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn schedule(start: &str, end: Option<&str>, pattern: Option<&str>) -> Schedule {
        Schedule {
            id: 1,
            name: "test".to_string(),
            kind: ScheduleKind::Custom,
            start_date: start.parse().unwrap(),
            end_date: end.map(|e| e.parse().unwrap()),
            category_id: 1,
            fallback_category_id: None,
            shuffle: true,
            playlist: false,
            priority: 5,
            exclusive: false,
            blend_enabled: false,
            is_active: true,
            recurrence_pattern: pattern.map(String::from),
            sequence: None,
            last_run: None,
            next_run: None,
        }
    }

    fn at(date: &str) -> NaiveDateTime {
        date.parse().unwrap()
    }

    const NA: &HolidayResolution = &HolidayResolution::NotApplicable;

    #[test]
    fn date_window_is_inclusive() {
        let s = schedule("2026-10-01T00:00:00", Some("2026-10-31T23:59:59"), None);
        assert!(!is_active(&s, at("2026-09-30T23:59:00"), NA));
        assert!(is_active(&s, at("2026-10-01T00:00:00"), NA));
        assert!(is_active(&s, at("2026-10-31T23:59:59"), NA));
        assert!(!is_active(&s, at("2026-11-01T00:00:00"), NA));
    }

    #[test]
    fn open_ended_schedule_runs_indefinitely() {
        let s = schedule("2026-01-01T00:00:00", None, None);
        assert!(is_active(&s, at("2030-06-15T12:00:00"), NA));
    }

    #[test]
    fn overnight_time_range_wraps_midnight() {
        let s = schedule(
            "2026-01-01T00:00:00",
            None,
            Some(r#"{"timeRange":{"start":"22:00","end":"03:00"}}"#),
        );
        assert!(is_active(&s, at("2026-06-01T23:59:00"), NA));
        assert!(is_active(&s, at("2026-06-01T02:00:00"), NA));
        assert!(!is_active(&s, at("2026-06-01T05:00:00"), NA));
        assert!(is_active(&s, at("2026-06-01T22:00:00"), NA));
        assert!(is_active(&s, at("2026-06-01T03:00:00"), NA));
    }

    #[test]
    fn normal_time_range_bounds_both_ends() {
        let s = schedule(
            "2026-01-01T00:00:00",
            None,
            Some(r#"{"timeRange":{"start":"09:00","end":"17:00"}}"#),
        );
        assert!(is_active(&s, at("2026-06-01T09:00:00"), NA));
        assert!(is_active(&s, at("2026-06-01T12:30:00"), NA));
        assert!(!is_active(&s, at("2026-06-01T08:59:00"), NA));
        assert!(!is_active(&s, at("2026-06-01T17:01:00"), NA));
    }

    #[test]
    fn days_of_week_use_monday_zero() {
        // [5, 6] = Saturday and Sunday
        let s = schedule(
            "2026-01-01T00:00:00",
            None,
            Some(r#"{"daysOfWeek":[5,6]}"#),
        );
        // 2026-06-06 is a Saturday, 2026-06-07 a Sunday, 2026-06-08 a Monday
        assert!(is_active(&s, at("2026-06-06T12:00:00"), NA));
        assert!(is_active(&s, at("2026-06-07T12:00:00"), NA));
        assert!(!is_active(&s, at("2026-06-08T12:00:00"), NA));
    }

    #[test]
    fn malformed_time_range_falls_back_to_dates() {
        let s = schedule(
            "2026-01-01T00:00:00",
            None,
            Some(r#"{"timeRange":{"start":"nonsense"}}"#),
        );
        assert!(is_active(&s, at("2026-06-01T12:00:00"), NA));
    }

    #[test]
    fn dynamic_holiday_matches_only_the_resolved_day() {
        let mut s = schedule("2026-01-01T00:00:00", None, None);
        s.kind = ScheduleKind::HolidayDynamic;
        let thanksgiving = HolidayResolution::Date { month: 11, day: 26 };
        assert!(is_active(&s, at("2026-11-26T12:00:00"), &thanksgiving));
        assert!(!is_active(&s, at("2026-11-25T12:00:00"), &thanksgiving));
        assert!(!is_active(&s, at("2026-11-26T12:00:00"), &HolidayResolution::Unresolved));
    }

    #[test]
    fn feb_29_preset_never_matches_in_non_leap_years() {
        let mut s = schedule("2026-01-01T00:00:00", None, None);
        s.kind = ScheduleKind::Holiday;
        let preset = HolidayPreset {
            id: 1,
            name: "Leap Day".to_string(),
            month: 2,
            day: 29,
            end_month: None,
            end_day: None,
            category_id: None,
        };
        let window = HolidayResolution::Window(preset);
        // 2026 is not a leap year; Feb 29 never occurs and nothing rolls over
        for day in [27, 28] {
            let now = NaiveDate::from_ymd_opt(2026, 2, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap();
            assert!(!is_active(&s, now, &window));
        }
        let mar1 = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert!(!is_active(&s, mar1, &window));
        // 2028 is a leap year
        let leap = NaiveDate::from_ymd_opt(2028, 2, 29)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert!(is_active(&s, leap, &window));
    }

    #[test]
    fn lookup_detection_reads_the_pattern() {
        let mut s = schedule(
            "2026-01-01T00:00:00",
            None,
            Some(r#"{"type":"holiday_dynamic","name":"Thanksgiving","country":"US"}"#),
        );
        s.kind = ScheduleKind::Yearly;
        assert_eq!(
            needs_holiday_lookup(&s),
            Some(("Thanksgiving".to_string(), "US".to_string()))
        );
        let plain = schedule("2026-01-01T00:00:00", None, None);
        assert_eq!(needs_holiday_lookup(&plain), None);
    }

    #[test]
    fn monthly_next_run_rolls_forward() {
        let mut s = schedule("2026-01-15T08:30:00", None, None);
        s.kind = ScheduleKind::Monthly;
        let next = next_run(&s, None, at("2026-03-20T00:00:00")).unwrap();
        assert_eq!(next, at("2026-04-15T08:30:00"));
        let before = next_run(&s, None, at("2026-03-10T00:00:00")).unwrap();
        assert_eq!(before, at("2026-03-15T08:30:00"));
    }

    #[test]
    fn yearly_next_run_rolls_to_next_year() {
        let mut s = schedule("2020-07-04T09:00:00", None, None);
        s.kind = ScheduleKind::Yearly;
        let next = next_run(&s, None, at("2026-08-01T00:00:00")).unwrap();
        assert_eq!(next, at("2027-07-04T09:00:00"));
    }
}
