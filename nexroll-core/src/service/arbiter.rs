//! Arbitration: one desired program from the set of active schedules
//!
//! Pure and deterministic: the same active set, settings row and clock
//! always produce the same decision (exclusive beats blend beats the
//! priority tuple; the empty set walks clear -> fallback -> filler).

use chrono::NaiveDateTime;

use crate::models::{FillerKind, Schedule, Setting};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveReason {
    /// Passive mode with nothing active; other pre-roll managers own the server.
    PassiveIdle,
    /// A genre override window is still open.
    OverrideActive,
    /// Nothing active and no fallback or filler configured.
    NothingConfigured,
    /// Filler enabled but its target is not set.
    FillerMisconfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillerProgram {
    Category(i64),
    Sequence(i64),
    ComingSoon(String),
}

/// The desired pre-roll program for this tick.
#[derive(Debug, Clone)]
pub enum Program {
    LeaveAsIs(LeaveReason),
    Clear,
    /// A single winning schedule; its sequence or category gets applied.
    Winner(Schedule),
    /// Two or more blend-enabled schedules, stable-ordered by id.
    Blend(Vec<Schedule>),
    /// No schedule active; the last winner's fallback category takes over.
    Fallback(i64),
    Filler(FillerProgram),
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub program: Program,
    /// `Some(value)` when the winner's fallback must be recorded on the
    /// settings row (including `Some(None)` to clear it).
    pub record_fallback: Option<Option<i64>>,
}

/// Max-sentinel for schedules without an end date: they lose end-date ties.
fn end_key(s: &Schedule) -> NaiveDateTime {
    s.end_date.unwrap_or(NaiveDateTime::MAX)
}

fn exclusive_key(s: &Schedule) -> (i64, NaiveDateTime, i64) {
    (-s.priority, end_key(s), s.id)
}

fn winner_key(s: &Schedule) -> (i64, NaiveDateTime, NaiveDateTime, i64) {
    (-s.priority, end_key(s), s.start_date, s.id)
}

pub fn decide(active: &[Schedule], setting: &Setting, now: NaiveDateTime) -> Decision {
    if setting.passive_mode && active.is_empty() {
        return Decision {
            program: Program::LeaveAsIs(LeaveReason::PassiveIdle),
            record_fallback: None,
        };
    }

    // A fresh genre apply owns the server until its window expires.
    if let Some(expires) = setting.override_expires_at {
        if now < expires {
            return Decision {
                program: Program::LeaveAsIs(LeaveReason::OverrideActive),
                record_fallback: None,
            };
        }
    }

    if !active.is_empty() {
        let exclusives: Vec<&Schedule> = active.iter().filter(|s| s.exclusive).collect();
        if !exclusives.is_empty() {
            let winner = exclusives
                .iter()
                .min_by_key(|s| exclusive_key(s))
                .copied()
                .cloned()
                .expect("non-empty exclusives");
            let fallback = winner.fallback_category_id;
            return Decision {
                program: Program::Winner(winner),
                record_fallback: Some(fallback),
            };
        }

        let mut blend: Vec<Schedule> = active
            .iter()
            .filter(|s| s.blend_enabled)
            .cloned()
            .collect();
        if blend.len() >= 2 {
            blend.sort_by_key(|s| s.id);
            return Decision {
                program: Program::Blend(blend),
                record_fallback: None,
            };
        }

        let winner = active
            .iter()
            .min_by_key(|s| winner_key(s))
            .cloned()
            .expect("non-empty active set");
        let fallback = winner.fallback_category_id;
        return Decision {
            program: Program::Winner(winner),
            record_fallback: Some(fallback),
        };
    }

    // Nothing active: clear, fallback, filler, or hands off.
    if setting.clear_when_inactive {
        return Decision {
            program: Program::Clear,
            record_fallback: None,
        };
    }
    if let Some(fallback) = setting.last_schedule_fallback {
        return Decision {
            program: Program::Fallback(fallback),
            record_fallback: None,
        };
    }
    if setting.filler_enabled {
        let filler = match setting.filler_type {
            FillerKind::Category => setting.filler_category_id.map(FillerProgram::Category),
            FillerKind::Sequence => setting.filler_sequence_id.map(FillerProgram::Sequence),
            FillerKind::ComingSoon => Some(FillerProgram::ComingSoon(
                setting.filler_coming_soon_layout.clone(),
            )),
        };
        return match filler {
            Some(program) => Decision {
                program: Program::Filler(program),
                record_fallback: None,
            },
            None => Decision {
                program: Program::LeaveAsIs(LeaveReason::FillerMisconfigured),
                record_fallback: None,
            },
        };
    }
    Decision {
        program: Program::LeaveAsIs(LeaveReason::NothingConfigured),
        record_fallback: None,
    }
}
