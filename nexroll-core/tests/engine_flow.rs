//! End-to-end decision-loop tests: in-memory store, stubbed Plex server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use nexroll_core::{
    config::Config,
    models::{Preroll, Schedule, ScheduleKind, Setting},
    repository::Repositories,
    service::{Engine, HolidayService},
};

const PREF_KEY: &str = "CinemaTrailersPrerollID";

#[derive(Clone, Default)]
struct PrefCell {
    value: Arc<Mutex<String>>,
    sets: Arc<AtomicUsize>,
}

impl PrefCell {
    fn get(&self) -> String {
        self.value.lock().expect("lock").clone()
    }

    fn set(&self, value: &str) {
        *self.value.lock().expect("lock") = value.to_string();
    }

    fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

struct StorePref(PrefCell);

impl Respond for StorePref {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let from_query = request
            .url
            .query_pairs()
            .find(|(k, _)| k == PREF_KEY)
            .map(|(_, v)| v.into_owned());
        let value = from_query.or_else(|| {
            url::form_urlencoded::parse(&request.body)
                .find(|(k, _)| k == PREF_KEY)
                .map(|(_, v)| v.into_owned())
        });
        if let Some(value) = value {
            self.0.set(&value);
            self.0.sets.fetch_add(1, Ordering::SeqCst);
        }
        ResponseTemplate::new(200)
    }
}

struct RenderPrefs(PrefCell);

impl Respond for RenderPrefs {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let body = format!(
            r#"<MediaContainer size="1"><Setting id="{PREF_KEY}" value="{}" /></MediaContainer>"#,
            self.0.get()
        );
        ResponseTemplate::new(200).set_body_raw(body, "text/xml")
    }
}

const EMPTY_SESSIONS: &str = r#"<MediaContainer size="0"></MediaContainer>"#;

/// Stub a Plex server: identity, prefs endpoints over a shared cell, and a
/// sessions payload.
async fn mount_plex(mock: &MockServer, cell: &PrefCell, platform: &str, sessions: &str) {
    let identity = format!(
        r#"<MediaContainer friendlyName="stub" version="1.40" platform="{platform}" machineIdentifier="m1"/>"#
    );
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(identity, "text/xml"))
        .mount(mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/:/prefs"))
        .respond_with(RenderPrefs(cell.clone()))
        .mount(mock)
        .await;
    Mock::given(method("PUT"))
        .and(path("/:/prefs"))
        .respond_with(StorePref(cell.clone()))
        .mount(mock)
        .await;
    Mock::given(method("POST"))
        .and(path("/:/prefs"))
        .respond_with(StorePref(cell.clone()))
        .mount(mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sessions.to_string(), "text/xml"))
        .mount(mock)
        .await;
}

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory db");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

fn test_config(plex_url: &str) -> Arc<Config> {
    let mut config = Config::default();
    config.plex.url = Some(plex_url.to_string());
    config.plex.token = Some("test-token".to_string());
    // Verify on every tick so drift tests do not depend on wall time
    config.scheduler.verification_interval_seconds = 0;
    Arc::new(config)
}

async fn build_engine(pool: SqlitePool, config: Arc<Config>) -> (Repositories, Arc<Engine>) {
    let repos = Repositories::new(pool);
    let holidays = Arc::new(HolidayService::new(&config.holiday_api));
    let engine = Engine::new(repos.clone(), Arc::clone(&config), holidays);
    (repos, engine)
}

async fn seed_category(
    repos: &Repositories,
    name: &str,
    mode: &str,
    paths: &[&str],
) -> (i64, Vec<i64>) {
    let category = repos
        .categories
        .create(
            name,
            None,
            nexroll_core::models::PlexMode::from_str(mode).expect("mode"),
        )
        .await
        .expect("create category");
    let mut ids = Vec::new();
    for p in paths {
        let preroll = repos
            .prerolls
            .create(&Preroll {
                id: 0,
                filename: p.rsplit(['/', '\\']).next().unwrap_or(p).to_string(),
                path: (*p).to_string(),
                display_name: None,
                category_id: Some(category.id),
                duration_seconds: None,
                file_size: None,
                managed: false,
            })
            .await
            .expect("create preroll");
        ids.push(preroll.id);
    }
    (category.id, ids)
}

fn schedule(name: &str, category_id: i64) -> Schedule {
    Schedule {
        id: 0,
        name: name.to_string(),
        kind: ScheduleKind::Custom,
        start_date: "2000-01-01T00:00:00".parse().expect("date"),
        end_date: None,
        category_id,
        fallback_category_id: None,
        shuffle: true,
        playlist: false,
        priority: 5,
        exclusive: false,
        blend_enabled: false,
        is_active: true,
        recurrence_pattern: None,
        sequence: None,
        last_run: None,
        next_run: None,
    }
}

async fn set_mappings(repos: &Repositories, mappings: &str) {
    let mut setting: Setting = repos.settings.get().await.expect("settings");
    setting.path_mappings = Some(mappings.to_string());
    repos.settings.update(&setting).await.expect("update settings");
}

#[tokio::test]
async fn schedule_apply_writes_shuffle_value_and_records_state() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Windows", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;
    set_mappings(&repos, r#"[{"local":"D:\\Media","plex":"Z:\\Media"}]"#).await;

    let (category_id, _) = seed_category(
        &repos,
        "Halloween",
        "shuffle",
        &[
            r"D:\Media\Halloween\a.mp4",
            r"D:\Media\Halloween\b.mp4",
            r"D:\Media\Halloween\c.mp4",
        ],
    )
    .await;
    repos
        .schedules
        .create(&schedule("spooky season", category_id))
        .await
        .expect("create schedule");

    engine.run_tick().await;

    assert_eq!(
        cell.get(),
        r"Z:\Media\Halloween\a.mp4;Z:\Media\Halloween\b.mp4;Z:\Media\Halloween\c.mp4"
    );
    let setting = repos.settings.get().await.expect("settings");
    assert_eq!(setting.active_category, Some(category_id));
    assert_eq!(setting.filler_active, None);

    let category = repos
        .categories
        .get_by_id(category_id)
        .await
        .expect("get")
        .expect("exists");
    assert!(category.apply_to_plex);

    // Bookkeeping was written for the winner
    let schedules = repos.schedules.list().await.expect("list");
    assert!(schedules[0].last_run.is_some());

    // Unchanged inputs do not re-apply
    let writes = cell.set_count();
    engine.run_tick().await;
    assert_eq!(cell.set_count(), writes);
}

#[tokio::test]
async fn sequence_schedule_applies_ordered_playlist() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Linux", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;
    set_mappings(&repos, r#"[{"local":"/data","plex":"/mnt/media"}]"#).await;

    let (fixed_cat, fixed_ids) = seed_category(
        &repos,
        "Bumpers",
        "shuffle",
        &["/data/fixed/one.mp4", "/data/fixed/two.mp4"],
    )
    .await;
    let (random_cat, _) = seed_category(
        &repos,
        "RandomPool",
        "shuffle",
        &["/data/pool/x.mp4", "/data/pool/y.mp4", "/data/pool/z.mp4"],
    )
    .await;

    let mut seq_schedule = schedule("feature intro", fixed_cat);
    seq_schedule.sequence = Some(format!(
        r#"[{{"type":"fixed","preroll_ids":[{},{}]}},{{"type":"random","category_id":{random_cat},"count":2}}]"#,
        fixed_ids[0], fixed_ids[1]
    ));
    repos
        .schedules
        .create(&seq_schedule)
        .await
        .expect("create schedule");

    engine.run_tick().await;

    let applied = cell.get();
    let parts: Vec<&str> = applied.split(',').collect();
    assert_eq!(parts.len(), 4, "two fixed + two random picks: {applied}");
    assert_eq!(parts[0], "/mnt/media/fixed/one.mp4");
    assert_eq!(parts[1], "/mnt/media/fixed/two.mp4");
    let pool_paths = [
        "/mnt/media/pool/x.mp4",
        "/mnt/media/pool/y.mp4",
        "/mnt/media/pool/z.mp4",
    ];
    assert!(pool_paths.contains(&parts[2]));
    assert!(pool_paths.contains(&parts[3]));
    assert_ne!(parts[2], parts[3], "random picks are without replacement");
}

#[tokio::test]
async fn platform_mismatch_refuses_apply() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Windows", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;

    // POSIX paths, Windows server, no mapping: the apply must refuse
    let (category_id, _) =
        seed_category(&repos, "Unmapped", "shuffle", &["/mnt/prerolls/a.mp4"]).await;

    let err = engine
        .applier()
        .apply_category(category_id)
        .await
        .expect_err("style mismatch must refuse");
    let message = err.to_string();
    assert!(message.contains("/mnt/prerolls/a.mp4"), "names the example: {message}");
    assert!(message.contains("mapping"), "suggests a mapping: {message}");
    assert_eq!(cell.get(), "", "nothing was sent to the server");
}

#[tokio::test]
async fn genre_intercept_sets_override_and_blocks_schedules_until_expiry() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    let sessions = r#"<MediaContainer size="1">
        <Video ratingKey="101" type="movie" viewOffset="5000">
            <Player state="playing" machineIdentifier="m1"/>
            <Genre tag="Horror"/>
        </Video>
    </MediaContainer>"#;
    mount_plex(&mock, &cell, "Linux", sessions).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;
    set_mappings(&repos, r#"[{"local":"/data","plex":"/mnt"}]"#).await;

    let (horror_cat, _) =
        seed_category(&repos, "HorrorRolls", "shuffle", &["/data/h/scream.mp4"]).await;
    let (regular_cat, _) =
        seed_category(&repos, "Regular", "shuffle", &["/data/r/plain.mp4"]).await;
    repos
        .genre_maps
        .create("Horror", "horror", horror_cat)
        .await
        .expect("map");

    // Tick 1: no schedules; the playing session applies the horror category
    engine.run_tick().await;
    assert_eq!(cell.get(), "/mnt/h/scream.mp4");
    let setting = repos.settings.get().await.expect("settings");
    assert_eq!(setting.active_category, Some(horror_cat));
    let expires = setting.override_expires_at.expect("override window set");
    assert!(expires > nexroll_core::now_local());

    // Tick 2: a schedule becomes active, but the override still holds
    repos
        .schedules
        .create(&schedule("regular hours", regular_cat))
        .await
        .expect("schedule");
    engine.run_tick().await;
    assert_eq!(cell.get(), "/mnt/h/scream.mp4");
    assert_eq!(
        repos.settings.get().await.expect("settings").active_category,
        Some(horror_cat)
    );

    // Tick 3: window expired (and the rating key is inside the dedupe TTL,
    // so the genre step stays quiet); the schedule takes over
    repos
        .settings
        .set_override_expires_at(Some("2000-01-01T00:00:00".parse().expect("date")))
        .await
        .expect("expire override");
    engine.run_tick().await;
    assert_eq!(cell.get(), "/mnt/r/plain.mp4");
    assert_eq!(
        repos.settings.get().await.expect("settings").active_category,
        Some(regular_cat)
    );

    let recent = engine.recent_genre_applications();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].genre, "Horror");
    assert_eq!(recent[0].rating_key.as_deref(), Some("101"));
}

#[tokio::test]
async fn reconciler_restores_drifted_preference() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Linux", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;
    set_mappings(&repos, r#"[{"local":"/data","plex":"/mnt"}]"#).await;

    let (category_id, _) = seed_category(
        &repos,
        "Evergreen",
        "shuffle",
        &["/data/e/a.mp4", "/data/e/b.mp4"],
    )
    .await;
    repos
        .schedules
        .create(&schedule("always on", category_id))
        .await
        .expect("schedule");

    engine.run_tick().await;
    let expected = "/mnt/e/a.mp4;/mnt/e/b.mp4";
    assert_eq!(cell.get(), expected);

    // Someone changes the preference behind the engine's back
    cell.set("");
    engine.run_tick().await;
    assert_eq!(cell.get(), expected, "drift was corrected");
}

#[tokio::test]
async fn clear_when_inactive_clears_on_idle() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Linux", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;

    let (category_id, _) = seed_category(&repos, "Old", "shuffle", &["/mnt/old/a.mp4"]).await;
    // Pretend a schedule applied this earlier
    cell.set("/mnt/old/a.mp4");
    repos
        .settings
        .record_applied(Some(category_id), None)
        .await
        .expect("seed active");

    let mut setting = repos.settings.get().await.expect("settings");
    setting.clear_when_inactive = true;
    repos.settings.update(&setting).await.expect("update");

    engine.run_tick().await;
    assert_eq!(cell.get(), "");
    let setting = repos.settings.get().await.expect("settings");
    assert_eq!(setting.active_category, None);
    assert_eq!(setting.filler_active, None);
}

#[tokio::test]
async fn fallback_category_applies_when_idle() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Linux", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;

    let (fallback_cat, _) =
        seed_category(&repos, "Fallback", "shuffle", &["/mnt/f/calm.mp4"]).await;
    repos
        .settings
        .set_last_schedule_fallback(Some(fallback_cat))
        .await
        .expect("seed fallback");

    engine.run_tick().await;
    assert_eq!(cell.get(), "/mnt/f/calm.mp4");
    assert_eq!(
        repos.settings.get().await.expect("settings").active_category,
        Some(fallback_cat)
    );
}

#[tokio::test]
async fn blend_interleaves_round_robin_and_applies_once() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Linux", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;

    let (cat1, _) = seed_category(
        &repos,
        "First",
        "shuffle",
        &["/mnt/1/a.mp4", "/mnt/1/b.mp4", "/mnt/1/c.mp4"],
    )
    .await;
    let (cat2, _) =
        seed_category(&repos, "Second", "shuffle", &["/mnt/2/x.mp4", "/mnt/2/y.mp4"]).await;

    let mut s1 = schedule("first", cat1);
    s1.blend_enabled = true;
    let mut s2 = schedule("second", cat2);
    s2.blend_enabled = true;
    repos.schedules.create(&s1).await.expect("s1");
    repos.schedules.create(&s2).await.expect("s2");

    engine.run_tick().await;

    // Whole pools contribute (both are <= the 3-sample cap), so the
    // round-robin interleave is fully determined
    assert_eq!(
        cell.get(),
        "/mnt/1/a.mp4;/mnt/2/x.mp4;/mnt/1/b.mp4;/mnt/2/y.mp4;/mnt/1/c.mp4"
    );
    assert_eq!(
        repos.settings.get().await.expect("settings").active_category,
        Some(cat1)
    );

    // A steady blend does not rewrite every tick
    let writes = cell.set_count();
    engine.run_tick().await;
    assert_eq!(cell.set_count(), writes);
}

#[tokio::test]
async fn filler_category_applies_and_tracks_state() {
    let mock = MockServer::start().await;
    let cell = PrefCell::default();
    mount_plex(&mock, &cell, "Linux", EMPTY_SESSIONS).await;

    let pool = test_pool().await;
    let (repos, engine) = build_engine(pool, test_config(&mock.uri())).await;

    let (filler_cat, _) =
        seed_category(&repos, "Filler", "shuffle", &["/mnt/fill/loop.mp4"]).await;
    let mut setting = repos.settings.get().await.expect("settings");
    setting.filler_enabled = true;
    setting.filler_category_id = Some(filler_cat);
    repos.settings.update(&setting).await.expect("update");

    engine.run_tick().await;
    assert_eq!(cell.get(), "/mnt/fill/loop.mp4");
    let setting = repos.settings.get().await.expect("settings");
    assert_eq!(
        setting.filler_active.as_deref(),
        Some(format!("category:{filler_cat}").as_str())
    );
    assert_eq!(setting.active_category, None, "filler clears the active category");

    // Idempotent while nothing changes
    let writes = cell.set_count();
    engine.run_tick().await;
    assert_eq!(cell.set_count(), writes);
}
