//! The decision engine
//!
//! One cooperative ticker drives genre intercept, schedule arbitration and
//! drift verification, in that order. Sub-steps log failures and continue;
//! nothing propagates across ticks. All mutable shared state lives in the
//! settings row; the in-process caches here (rotation timers, log de-dup,
//! genre dedupe) are owned by the engine alone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    config::Config,
    models::{Schedule, ScheduleKind},
    now_local,
    provider::{self, PlexServer, PlexSession},
    repository::Repositories,
    service::{
        apply::Applier,
        arbiter::{self, FillerProgram, LeaveReason, Program},
        evaluator::{self, HolidayResolution},
        genre::{self, GenreApplication, GenreApplyOutcome, GenreState},
        holiday::HolidayService,
    },
    Result,
};

/// Repeated steady-state log lines are suppressed until the state key
/// changes or this many seconds elapse.
const LOG_REPEAT_SECONDS: i64 = 300;

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub interval_seconds: u64,
    pub last_tick: Option<NaiveDateTime>,
    pub active_schedule_ids: Vec<i64>,
}

pub struct Engine {
    repos: Repositories,
    config: Arc<Config>,
    applier: Applier,
    holidays: Arc<HolidayService>,
    genre_state: GenreState,
    running: AtomicBool,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
    last_tick: Mutex<Option<NaiveDateTime>>,
    last_verification: Mutex<Option<NaiveDateTime>>,
    last_rotation: Mutex<HashMap<i64, NaiveDateTime>>,
    last_blend_key: Mutex<Option<String>>,
    last_logged: Mutex<Option<(String, NaiveDateTime)>>,
}

impl Engine {
    pub fn new(repos: Repositories, config: Arc<Config>, holidays: Arc<HolidayService>) -> Arc<Self> {
        let applier = Applier::new(repos.clone(), Arc::clone(&config));
        Arc::new(Self {
            repos,
            config,
            applier,
            holidays,
            genre_state: GenreState::new(),
            running: AtomicBool::new(false),
            stop_tx: Mutex::new(None),
            last_tick: Mutex::new(None),
            last_verification: Mutex::new(None),
            last_rotation: Mutex::new(HashMap::new()),
            last_blend_key: Mutex::new(None),
            last_logged: Mutex::new(None),
        })
    }

    pub fn applier(&self) -> &Applier {
        &self.applier
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> EngineStatus {
        let active_schedule_ids = self
            .active_schedules()
            .await
            .map(|schedules| schedules.iter().map(|s| s.id).collect())
            .unwrap_or_default();
        EngineStatus {
            running: self.is_running(),
            interval_seconds: self.config.scheduler.interval_seconds,
            last_tick: *self.last_tick.lock(),
            active_schedule_ids,
        }
    }

    /// Spawn the ticker. Returns false when it is already running. A stop
    /// signal lets the in-flight tick drain before the task exits.
    pub fn start(self: Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let (tx, mut rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(tx);

        let engine = self;
        tokio::spawn(async move {
            let period =
                std::time::Duration::from_secs(engine.config.scheduler.interval_seconds);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                "SCHEDULER: started (interval {}s)",
                engine.config.scheduler.interval_seconds
            );
            loop {
                tokio::select! {
                    _ = interval.tick() => engine.run_tick().await,
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            engine.running.store(false, Ordering::SeqCst);
            info!("SCHEDULER: stopped");
        });
        true
    }

    pub fn stop(&self) -> bool {
        match self.stop_tx.lock().take() {
            Some(tx) => tx.send(true).is_ok(),
            None => false,
        }
    }

    /// One full tick: genre -> schedule -> verify. A failing sub-step never
    /// skips the others.
    pub async fn run_tick(&self) {
        *self.last_tick.lock() = Some(now_local());
        if let Err(e) = self.genre_tick().await {
            warn!("SCHEDULER: genre step failed: {e}");
        }
        if let Err(e) = self.schedule_tick().await {
            warn!("SCHEDULER: schedule step failed: {e}");
        }
        if let Err(e) = self.verify_tick().await {
            warn!("SCHEDULER: verification step failed: {e}");
        }
    }

    /// Drop the rotation timestamp after a schedule edit so the next win
    /// re-expands immediately.
    pub fn reset_rotation(&self, schedule_id: i64) {
        self.last_rotation.lock().remove(&schedule_id);
    }

    pub fn recent_genre_applications(&self) -> Vec<GenreApplication> {
        self.genre_state.recent()
    }

    fn log_once(&self, key: &str, message: &str) {
        let now = now_local();
        let mut guard = self.last_logged.lock();
        let should_log = match guard.as_ref() {
            Some((last_key, at)) => {
                last_key != key || (now - *at).num_seconds() > LOG_REPEAT_SECONDS
            }
            None => true,
        };
        if should_log {
            info!("SCHEDULER: {message}");
            *guard = Some((key.to_string(), now));
        }
    }

    // ----- schedule evaluation -----

    pub async fn active_schedules(&self) -> Result<Vec<Schedule>> {
        self.active_schedules_at(now_local()).await
    }

    async fn active_schedules_at(&self, now: NaiveDateTime) -> Result<Vec<Schedule>> {
        let enabled = self.repos.schedules.list_enabled().await?;
        let mut active = Vec::new();
        for schedule in enabled {
            let resolution = self.resolve_holiday(&schedule, now).await?;
            if evaluator::is_active(&schedule, now, &resolution) {
                active.push(schedule);
            }
        }
        Ok(active)
    }

    async fn resolve_holiday(
        &self,
        schedule: &Schedule,
        now: NaiveDateTime,
    ) -> Result<HolidayResolution> {
        if let Some((name, country)) = evaluator::needs_holiday_lookup(schedule) {
            return Ok(
                match self.holidays.holiday_date(&name, &country, now.year()).await {
                    Some((month, day)) => HolidayResolution::Date { month, day },
                    None => HolidayResolution::Unresolved,
                },
            );
        }
        if schedule.kind == ScheduleKind::Holiday {
            if let Some(preset) = self
                .repos
                .holiday_presets
                .get_by_category(schedule.category_id)
                .await?
            {
                return Ok(HolidayResolution::Window(preset));
            }
        }
        Ok(HolidayResolution::NotApplicable)
    }

    async fn bookkeep(&self, schedule: &Schedule, now: NaiveDateTime) -> Result<()> {
        let preset = if schedule.kind == ScheduleKind::Holiday {
            self.repos
                .holiday_presets
                .get_by_category(schedule.category_id)
                .await?
        } else {
            None
        };
        let next = evaluator::next_run(schedule, preset.as_ref(), now);
        self.repos
            .schedules
            .set_bookkeeping(schedule.id, now, next)
            .await
    }

    // ----- tick sub-steps -----

    async fn schedule_tick(&self) -> Result<()> {
        let now = now_local();
        // Re-read settings after the genre step: an override written this
        // tick must be honoured on this same tick.
        let setting = self.repos.settings.get().await?;
        let active = self.active_schedules_at(now).await?;
        let decision = arbiter::decide(&active, &setting, now);

        if let Some(fallback) = decision.record_fallback {
            if setting.last_schedule_fallback != fallback {
                self.repos.settings.set_last_schedule_fallback(fallback).await?;
            }
        }

        match decision.program {
            Program::LeaveAsIs(reason) => {
                let (key, message) = match reason {
                    LeaveReason::PassiveIdle => (
                        "passive_mode_idle",
                        "passive mode enabled and no active schedules; leaving preroll management to others",
                    ),
                    LeaveReason::OverrideActive => (
                        "override_active",
                        "genre override window active; skipping schedule apply",
                    ),
                    LeaveReason::NothingConfigured => (
                        "no_schedules",
                        "no active schedules and no fallback or filler configured; preroll unchanged",
                    ),
                    LeaveReason::FillerMisconfigured => (
                        "filler_not_configured",
                        "filler enabled but not configured properly; preroll unchanged",
                    ),
                };
                self.log_once(key, message);
            }

            Program::Clear => {
                if setting.active_category.is_some() || setting.filler_active.is_some() {
                    self.log_once(
                        "clearing_inactive",
                        "no active schedules; clearing preroll (clear_when_inactive enabled)",
                    );
                    self.applier.clear().await?;
                    self.repos.settings.record_applied(None, None).await?;
                }
            }

            Program::Blend(schedules) => {
                let blend_key = schedules
                    .iter()
                    .map(|s| s.id.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                let already_live = self.applier.state().blend_active()
                    && self.last_blend_key.lock().as_deref() == Some(blend_key.as_str());
                if already_live {
                    self.log_once(
                        &format!("blend_active:{blend_key}"),
                        "blend pool still active",
                    );
                } else {
                    info!(
                        "SCHEDULER: blend mode: {} schedules blending together",
                        schedules.len()
                    );
                    self.applier.apply_blend(&schedules).await?;
                    *self.last_blend_key.lock() = Some(blend_key.clone());
                    self.repos
                        .settings
                        .record_applied(Some(schedules[0].category_id), None)
                        .await?;
                    for schedule in &schedules {
                        self.bookkeep(schedule, now).await?;
                    }
                    self.log_once(
                        &format!("blend_active:{blend_key}"),
                        &format!("blend mode active across schedules [{blend_key}]"),
                    );
                }
            }

            Program::Winner(schedule) => {
                let desired = schedule.category_id;
                let state_key = format!("schedule_active:{}:{desired}", schedule.id);
                if setting.active_category != Some(desired) {
                    if schedule.has_sequence() {
                        self.applier.apply_schedule_sequence(&schedule).await?;
                        self.last_rotation.lock().insert(schedule.id, now);
                    } else {
                        self.applier.apply_category(desired).await?;
                    }
                    self.repos.settings.record_applied(Some(desired), None).await?;
                    self.bookkeep(&schedule, now).await?;
                    self.log_once(
                        &state_key,
                        &format!(
                            "active schedule selected: '{}' (id {}) -> category {desired}",
                            schedule.name, schedule.id
                        ),
                    );
                } else if self.rotation_due(&schedule, now) {
                    self.applier.apply_schedule_sequence(&schedule).await?;
                    self.last_rotation.lock().insert(schedule.id, now);
                    info!(
                        "SCHEDULER: rotated random blocks for schedule '{}' (id {})",
                        schedule.name, schedule.id
                    );
                } else {
                    self.log_once(&state_key, &format!("category {desired} still active"));
                }
            }

            Program::Fallback(category_id) => {
                if setting.active_category != Some(category_id) {
                    self.log_once(
                        &format!("fallback:{category_id}"),
                        &format!(
                            "no active schedules; using fallback category {category_id} from last active schedule"
                        ),
                    );
                    self.applier.apply_category(category_id).await?;
                    self.repos
                        .settings
                        .record_applied(Some(category_id), None)
                        .await?;
                }
            }

            Program::Filler(program) => {
                let encoded = match &program {
                    FillerProgram::Category(id) => format!("category:{id}"),
                    FillerProgram::Sequence(id) => format!("sequence:{id}"),
                    FillerProgram::ComingSoon(layout) => format!("coming_soon:{layout}"),
                };
                if setting.filler_active.as_deref() == Some(encoded.as_str()) {
                    self.log_once(&format!("filler:{encoded}"), "filler still active");
                } else {
                    self.log_once(
                        &format!("filler:{encoded}"),
                        &format!("no active schedules; using filler {encoded}"),
                    );
                    match &program {
                        FillerProgram::Category(id) => {
                            self.applier.apply_category(*id).await?;
                        }
                        FillerProgram::Sequence(id) => {
                            self.applier.apply_saved_sequence(*id).await?;
                        }
                        FillerProgram::ComingSoon(layout) => {
                            self.applier.apply_coming_soon(layout).await?;
                        }
                    }
                    self.repos.settings.record_applied(None, Some(&encoded)).await?;
                }
            }
        }
        Ok(())
    }

    fn rotation_due(&self, schedule: &Schedule, now: NaiveDateTime) -> bool {
        if !schedule.has_random_step() {
            return false;
        }
        let interval = self.config.scheduler.rotation_interval_seconds as i64;
        match self.last_rotation.lock().get(&schedule.id) {
            Some(last) => (now - *last).num_seconds() >= interval,
            None => true,
        }
    }

    /// Drift correction on its own cadence. Skips whenever the expected
    /// value cannot be rebuilt faithfully: blend pools carry random samples,
    /// sequences rotate themselves, and passive idle means hands off.
    async fn verify_tick(&self) -> Result<()> {
        let now = now_local();
        let interval = self.config.scheduler.verification_interval_seconds as i64;
        if let Some(last) = *self.last_verification.lock() {
            if (now - last).num_seconds() < interval {
                return Ok(());
            }
        }

        let setting = self.repos.settings.get().await?;
        if setting.passive_mode && self.active_schedules_at(now).await?.is_empty() {
            *self.last_verification.lock() = Some(now);
            return Ok(());
        }
        let Some(active_category) = setting.active_category else {
            return Ok(());
        };
        if self.applier.state().blend_active() {
            *self.last_verification.lock() = Some(now);
            return Ok(());
        }
        let active = self.active_schedules_at(now).await?;
        if active
            .iter()
            .any(|s| s.category_id == active_category && s.has_sequence())
        {
            *self.last_verification.lock() = Some(now);
            return Ok(());
        }

        let expected = match self.applier.expected_category_value(active_category).await {
            Ok(expected) => expected,
            Err(crate::Error::State(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        let actual = self.applier.read_preroll().await?;
        if expected.trim() != actual.trim() {
            warn!("SCHEDULER: verification found preroll drift; reapplying category {active_category}");
            self.applier.apply_category(active_category).await?;
        }
        *self.last_verification.lock() = Some(now);
        Ok(())
    }

    // ----- genre intercept -----

    async fn genre_tick(&self) -> Result<()> {
        let setting = self.repos.settings.get().await?;
        if !setting.genre_auto_apply {
            return Ok(());
        }
        if setting.plex_url.is_none() && self.config.plex.url.is_none() {
            return Ok(());
        }
        let plex = provider::plex_server(&setting, &self.config)?;
        let sessions = plex.sessions().await?;
        let Some(session) = genre::pick_session(&sessions).cloned() else {
            return Ok(());
        };

        let now = now_local();
        let ttl = setting.genre_override_ttl_seconds;
        if self
            .genre_state
            .recently_applied(&session.rating_key, ttl, now)
        {
            return Ok(());
        }

        let genres = self.gather_genres(&plex, &session).await;
        if genres.is_empty() {
            return Ok(());
        }
        let rating_key = session.rating_key.clone();
        let outcome = self
            .resolve_and_apply(genres, Some(rating_key.clone()), ttl)
            .await?;
        if let GenreApplyOutcome::Applied {
            genre,
            category_name,
            ..
        } = &outcome
        {
            info!(
                "SCHEDULER: genre mapping applied for ratingKey={rating_key}: '{genre}' -> category '{category_name}'"
            );
        }
        Ok(())
    }

    /// Synchronous entry used by webhook receivers: resolve an item by its
    /// rating key and run the same TTL/priority/apply pipeline.
    pub async fn apply_by_rating_key(
        &self,
        rating_key: &str,
        ttl_override: Option<i64>,
    ) -> Result<GenreApplyOutcome> {
        let setting = self.repos.settings.get().await?;
        let ttl = ttl_override.unwrap_or(setting.genre_override_ttl_seconds);
        let now = now_local();
        if self.genre_state.recently_applied(rating_key, ttl, now) {
            return Ok(GenreApplyOutcome::Skipped {
                reason: format!("ratingKey {rating_key} applied within the last {ttl}s"),
            });
        }

        let plex = provider::plex_server(&setting, &self.config)?;
        let mut genres = Vec::new();
        if let Some(item) = plex.metadata(rating_key).await? {
            genres = self.gather_genres(&plex, &item).await;
        }
        if genres.is_empty() {
            // Metadata is often not populated yet at start-of-play; fall back
            // to whatever session is live right now.
            if let Ok(sessions) = plex.sessions().await {
                let best = sessions
                    .iter()
                    .find(|s| s.rating_key == rating_key)
                    .or_else(|| genre::pick_session(&sessions))
                    .cloned();
                if let Some(session) = best {
                    genres = self.gather_genres(&plex, &session).await;
                }
            }
        }
        if genres.is_empty() {
            return Ok(GenreApplyOutcome::NoGenres);
        }
        self.resolve_and_apply(genres, Some(rating_key.to_string()), ttl)
            .await
    }

    /// Direct genre-list apply (webhook fallback and the management API).
    pub async fn apply_genres(
        &self,
        genres: Vec<String>,
        ttl_override: Option<i64>,
    ) -> Result<GenreApplyOutcome> {
        if genres.is_empty() {
            return Ok(GenreApplyOutcome::NoGenres);
        }
        let setting = self.repos.settings.get().await?;
        let ttl = ttl_override.unwrap_or(setting.genre_override_ttl_seconds);
        self.resolve_and_apply(genres, None, ttl).await
    }

    /// Fetch genres for an item, falling back to its parent and grandparent
    /// metadata when the item itself carries none (episodes usually do not).
    async fn gather_genres(&self, plex: &PlexServer, session: &PlexSession) -> Vec<String> {
        let mut genres = session.genres.clone();
        let mut parent = session.parent_rating_key.clone();
        let mut grandparent = session.grandparent_rating_key.clone();

        if genres.is_empty() && !session.rating_key.is_empty() {
            if let Ok(Some(item)) = plex.metadata(&session.rating_key).await {
                genres = item.genres;
                if parent.is_none() {
                    parent = item.parent_rating_key;
                }
                if grandparent.is_none() {
                    grandparent = item.grandparent_rating_key;
                }
            }
        }
        if genres.is_empty() {
            for key in [parent, grandparent].into_iter().flatten() {
                if let Ok(Some(item)) = plex.metadata(&key).await {
                    genres.extend(item.genres);
                }
            }
        }
        genre::dedupe_genres(genres)
    }

    async fn resolve_category(
        &self,
        genres: &[String],
    ) -> Result<Option<(String, crate::models::Category)>> {
        for raw in genres {
            for key in genre::candidates(raw) {
                if let Some(map) = self.repos.genre_maps.get_by_norm(&key).await? {
                    if let Some(category) =
                        self.repos.categories.get_by_id(map.category_id).await?
                    {
                        return Ok(Some((raw.clone(), category)));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn resolve_and_apply(
        &self,
        genres: Vec<String>,
        rating_key: Option<String>,
        ttl: i64,
    ) -> Result<GenreApplyOutcome> {
        let genres = genre::dedupe_genres(genres);
        let Some((display, category)) = self.resolve_category(&genres).await? else {
            return Ok(GenreApplyOutcome::NoMatch { genres });
        };

        let setting = self.repos.settings.get().await?;
        if setting.genre_priority_mode == crate::models::GenrePriorityMode::SchedulesOverride
            && !self.active_schedules().await?.is_empty()
        {
            return Ok(GenreApplyOutcome::Skipped {
                reason: "an active schedule takes precedence (priority mode: schedules_override)"
                    .to_string(),
            });
        }

        self.applier.apply_category(category.id).await?;
        let now = now_local();
        self.repos
            .settings
            .record_applied(Some(category.id), None)
            .await?;
        self.repos
            .settings
            .set_override_expires_at(Some(now + chrono::Duration::seconds(ttl)))
            .await?;
        if let Some(key) = &rating_key {
            self.genre_state.mark_applied(key, now);
        }
        self.genre_state.record(GenreApplication {
            timestamp: now,
            genre: display.clone(),
            category_name: category.name.clone(),
            rating_key,
        });

        Ok(GenreApplyOutcome::Applied {
            genre: display,
            category_name: category.name,
            category_id: category.id,
        })
    }
}
