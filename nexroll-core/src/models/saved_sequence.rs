use serde::{Deserialize, Serialize};

use super::schedule::{parse_sequence_lenient, SequenceStep};

/// Reusable named sequence of steps, primarily for filler mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSequence {
    pub id: i64,
    pub name: String,
    /// JSON step list, same format as `Schedule.sequence`.
    pub steps: String,
}

impl SavedSequence {
    pub fn sequence_steps(&self) -> Vec<SequenceStep> {
        parse_sequence_lenient(&self.steps)
    }
}
