pub mod apply;
pub mod arbiter;
pub mod engine;
pub mod evaluator;
pub mod genre;
pub mod holiday;
pub mod paths;
pub mod sequence;

pub use apply::Applier;
pub use arbiter::{Decision, FillerProgram, LeaveReason, Program};
pub use engine::{Engine, EngineStatus};
pub use evaluator::HolidayResolution;
pub use genre::{GenreApplication, GenreApplyOutcome};
pub use holiday::HolidayService;
pub use paths::PathTranslator;
