pub mod category;
pub mod genre_map;
pub mod holiday_preset;
pub mod preroll;
pub mod saved_sequence;
pub mod schedule;
pub mod setting;

pub use category::{Category, PlexMode};
pub use genre_map::GenreMap;
pub use holiday_preset::HolidayPreset;
pub use preroll::Preroll;
pub use saved_sequence::SavedSequence;
pub use schedule::{
    RecurrencePattern, Schedule, ScheduleKind, SequenceStep, TimeRange,
};
pub use setting::{
    FillerActive, FillerKind, GenrePriorityMode, PathMapping, Setting,
};
