//! Repository behaviour against an in-memory SQLite store.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use nexroll_core::{
    models::{PlexMode, Preroll, Setting},
    repository::Repositories,
    Error,
};

async fn repos() -> Repositories {
    let pool: SqlitePool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory db");
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Repositories::new(pool)
}

fn preroll(path: &str, category_id: Option<i64>) -> Preroll {
    Preroll {
        id: 0,
        filename: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        display_name: None,
        category_id,
        duration_seconds: None,
        file_size: None,
        managed: false,
    }
}

#[tokio::test]
async fn category_names_are_unique() {
    let repos = repos().await;
    repos
        .categories
        .create("Halloween", None, PlexMode::Shuffle)
        .await
        .expect("first");
    let err = repos
        .categories
        .create("Halloween", None, PlexMode::Playlist)
        .await
        .expect_err("duplicate must fail");
    assert!(matches!(err, Error::AlreadyExists(_)));
}

#[tokio::test]
async fn apply_to_plex_marker_is_one_true() {
    let repos = repos().await;
    let a = repos
        .categories
        .create("A", None, PlexMode::Shuffle)
        .await
        .expect("a");
    let b = repos
        .categories
        .create("B", None, PlexMode::Shuffle)
        .await
        .expect("b");

    repos.categories.set_applied(Some(a.id)).await.expect("apply a");
    repos.categories.set_applied(Some(b.id)).await.expect("apply b");

    let applied: Vec<i64> = repos
        .categories
        .list()
        .await
        .expect("list")
        .into_iter()
        .filter(|c| c.apply_to_plex)
        .map(|c| c.id)
        .collect();
    assert_eq!(applied, vec![b.id]);

    repos.categories.set_applied(None).await.expect("clear");
    assert!(repos
        .categories
        .list()
        .await
        .expect("list")
        .iter()
        .all(|c| !c.apply_to_plex));
}

#[tokio::test]
async fn category_pool_is_the_union_of_primary_and_memberships() {
    let repos = repos().await;
    let primary = repos
        .categories
        .create("Primary", None, PlexMode::Shuffle)
        .await
        .expect("primary");
    let extra = repos
        .categories
        .create("Extra", None, PlexMode::Shuffle)
        .await
        .expect("extra");

    let own = repos
        .prerolls
        .create(&preroll("/m/own.mp4", Some(primary.id)))
        .await
        .expect("own");
    let linked = repos
        .prerolls
        .create(&preroll("/m/linked.mp4", Some(extra.id)))
        .await
        .expect("linked");
    let both = repos
        .prerolls
        .create(&preroll("/m/both.mp4", Some(primary.id)))
        .await
        .expect("both");

    repos
        .prerolls
        .set_additional_categories(linked.id, &[primary.id])
        .await
        .expect("link");
    // A membership matching the primary must not duplicate the row
    repos
        .prerolls
        .set_additional_categories(both.id, &[primary.id])
        .await
        .expect("self link");

    let pool: Vec<i64> = repos
        .prerolls
        .list_by_category(primary.id)
        .await
        .expect("pool")
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(pool, vec![own.id, linked.id, both.id]);
}

#[tokio::test]
async fn editing_memberships_keeps_the_primary() {
    let repos = repos().await;
    let primary = repos
        .categories
        .create("Primary", None, PlexMode::Shuffle)
        .await
        .expect("primary");
    let other = repos
        .categories
        .create("Other", None, PlexMode::Shuffle)
        .await
        .expect("other");

    let p = repos
        .prerolls
        .create(&preroll("/m/a.mp4", Some(primary.id)))
        .await
        .expect("create");
    repos
        .prerolls
        .set_additional_categories(p.id, &[other.id])
        .await
        .expect("set");
    repos
        .prerolls
        .set_additional_categories(p.id, &[])
        .await
        .expect("clear");

    let reloaded = repos
        .prerolls
        .get_by_id(p.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(reloaded.category_id, Some(primary.id));
    assert!(repos
        .prerolls
        .additional_categories(p.id)
        .await
        .expect("memberships")
        .is_empty());
}

#[tokio::test]
async fn settings_singleton_round_trip() {
    let repos = repos().await;
    let mut setting: Setting = repos.settings.get().await.expect("defaults");
    assert!(!setting.filler_enabled);
    assert_eq!(setting.genre_override_ttl_seconds, 900);

    setting.plex_url = Some("http://plex:32400".to_string());
    setting.clear_when_inactive = true;
    setting.path_mappings = Some(r#"[{"local":"/a","plex":"/b"}]"#.to_string());
    let updated = repos.settings.update(&setting).await.expect("update");
    assert_eq!(updated.plex_url.as_deref(), Some("http://plex:32400"));
    assert!(updated.clear_when_inactive);
    assert_eq!(updated.mappings().len(), 1);

    // Engine-owned fields go through their dedicated setters
    repos
        .settings
        .record_applied(Some(7), Some("category:7"))
        .await
        .expect("record");
    repos
        .settings
        .set_last_schedule_fallback(Some(3))
        .await
        .expect("fallback");
    let reloaded = repos.settings.get().await.expect("get");
    assert_eq!(reloaded.active_category, Some(7));
    assert_eq!(reloaded.filler_active.as_deref(), Some("category:7"));
    assert_eq!(reloaded.last_schedule_fallback, Some(3));

    // An operator update never clobbers engine-owned fields
    let again = repos.settings.update(&reloaded).await.expect("update");
    assert_eq!(again.active_category, Some(7));
    assert_eq!(again.last_schedule_fallback, Some(3));
}

#[tokio::test]
async fn schedule_bookkeeping_updates_only_run_fields() {
    let repos = repos().await;
    let category = repos
        .categories
        .create("Cat", None, PlexMode::Shuffle)
        .await
        .expect("cat");
    let schedule = repos
        .schedules
        .create(&nexroll_core::models::Schedule {
            id: 0,
            name: "s".to_string(),
            kind: nexroll_core::models::ScheduleKind::Custom,
            start_date: "2026-01-01T00:00:00".parse().expect("date"),
            end_date: None,
            category_id: category.id,
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
        })
        .await
        .expect("create");

    let ran_at = "2026-06-01T12:00:00".parse().expect("date");
    repos
        .schedules
        .set_bookkeeping(schedule.id, ran_at, None)
        .await
        .expect("bookkeeping");
    let reloaded = repos
        .schedules
        .get_by_id(schedule.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(reloaded.last_run, Some(ran_at));
    assert_eq!(reloaded.next_run, None);
    assert_eq!(reloaded.name, "s");
}
