pub mod category;
pub mod genre_map;
pub mod holiday_preset;
pub mod preroll;
pub mod saved_sequence;
pub mod schedule;
pub mod setting;

pub use category::CategoryRepository;
pub use genre_map::GenreMapRepository;
pub use holiday_preset::HolidayPresetRepository;
pub use preroll::PrerollRepository;
pub use saved_sequence::SavedSequenceRepository;
pub use schedule::ScheduleRepository;
pub use setting::SettingRepository;

use sqlx::SqlitePool;

/// Bundle of all repositories over one pool; cheap to clone.
#[derive(Clone)]
pub struct Repositories {
    pub categories: CategoryRepository,
    pub prerolls: PrerollRepository,
    pub schedules: ScheduleRepository,
    pub genre_maps: GenreMapRepository,
    pub holiday_presets: HolidayPresetRepository,
    pub saved_sequences: SavedSequenceRepository,
    pub settings: SettingRepository,
}

impl Repositories {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            categories: CategoryRepository::new(pool.clone()),
            prerolls: PrerollRepository::new(pool.clone()),
            schedules: ScheduleRepository::new(pool.clone()),
            genre_maps: GenreMapRepository::new(pool.clone()),
            holiday_presets: HolidayPresetRepository::new(pool.clone()),
            saved_sequences: SavedSequenceRepository::new(pool.clone()),
            settings: SettingRepository::new(pool),
        }
    }
}
