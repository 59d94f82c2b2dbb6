use serde::{Deserialize, Serialize};

/// Named month/day-range preset usable as a schedule source.
///
/// A single-day holiday leaves `end_month`/`end_day` unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayPreset {
    pub id: i64,
    pub name: String,
    pub month: u32,
    pub day: u32,
    pub end_month: Option<u32>,
    pub end_day: Option<u32>,
    pub category_id: Option<i64>,
}

impl HolidayPreset {
    /// Whether `(month, day)` falls inside the preset window. Single-day
    /// presets match only their own date; ranges may wrap the year end
    /// (e.g. Dec 20 -> Jan 5). Feb 29 never matches in a non-leap year
    /// because that `(month, day)` never occurs.
    pub fn contains(&self, month: u32, day: u32) -> bool {
        let start = (self.month, self.day);
        let end = match (self.end_month, self.end_day) {
            (Some(m), Some(d)) => (m, d),
            _ => start,
        };
        let probe = (month, day);
        if start <= end {
            start <= probe && probe <= end
        } else {
            // Wrapping window across the year boundary
            probe >= start || probe <= end
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(month: u32, day: u32, end: Option<(u32, u32)>) -> HolidayPreset {
        HolidayPreset {
            id: 1,
            name: "test".to_string(),
            month,
            day,
            end_month: end.map(|(m, _)| m),
            end_day: end.map(|(_, d)| d),
            category_id: None,
        }
    }

    #[test]
    fn single_day_matches_only_itself() {
        let halloween = preset(10, 31, None);
        assert!(halloween.contains(10, 31));
        assert!(!halloween.contains(10, 30));
        assert!(!halloween.contains(11, 1));
    }

    #[test]
    fn range_spans_days() {
        let season = preset(12, 1, Some((12, 26)));
        assert!(season.contains(12, 1));
        assert!(season.contains(12, 25));
        assert!(!season.contains(12, 27));
    }

    #[test]
    fn wrapping_range_crosses_new_year() {
        let season = preset(12, 20, Some((1, 5)));
        assert!(season.contains(12, 31));
        assert!(season.contains(1, 1));
        assert!(!season.contains(6, 15));
    }
}
