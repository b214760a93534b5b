use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use leaderboard_watch::config::Config;
use leaderboard_watch::diff::{ChangeKind, SourceStatus};
use leaderboard_watch::leaderboard::{parse_scrape_batch, Snapshot, SourceId};
use leaderboard_watch::run_pass;
use leaderboard_watch::snapshot::{summarize_model_history, SnapshotStore};

fn arena_batch(rows: serde_json::Value) -> String {
    json!({
        "arena_text": rows,
        "vellum": [
            {"model": "steady", "rank": 1, "score": 71.0},
            {"model": "other", "rank": 2, "score": 65.0}
        ]
    })
    .to_string()
}

#[test]
fn seed_then_diff_then_reload_through_the_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("state").join("watch.db");
    let validated = Config::default().validate().expect("default config is valid");
    let enabled = [SourceId::ArenaText, SourceId::Vellum];

    let day_one = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap();
    let first = parse_scrape_batch(
        &arena_batch(json!([
            {"model": "A", "rank": 3, "rating": 1400.0, "votes": 1200},
            {"model": "B", "rank": 5, "rating": 1380.0}
        ])),
        &enabled,
    )
    .expect("first batch");

    {
        let mut store = SnapshotStore::open(&db_path).expect("open");
        assert!(store.load_baseline().expect("load").is_none());
        let seeded = run_pass(&Snapshot::new(day_one), &first, &validated.thresholds, day_one);
        store.commit_run(&seeded).expect("commit seed");
    }

    let day_two = day_one + Duration::days(1);
    let second = parse_scrape_batch(
        &arena_batch(json!([
            {"model": "C", "rank": 1, "rating": 1450.0},
            {"model": "A", "rank": 3, "rating": 1400.0, "votes": 1300},
            {"model": "B", "rank": 5, "rating": 1381.0}
        ])),
        &enabled,
    )
    .expect("second batch");

    let mut store = SnapshotStore::open(&db_path).expect("reopen");
    let baseline = store.load_baseline().expect("load").expect("seeded baseline");
    assert_eq!(baseline.entries(SourceId::ArenaText).len(), 2);
    assert_eq!(
        baseline.entries(SourceId::ArenaText)[0].details.get("votes"),
        Some(&json!(1200))
    );

    let outcome = run_pass(&baseline, &second, &validated.thresholds, day_two);
    assert_eq!(outcome.events.len(), 1);
    let event = &outcome.events[0];
    assert_eq!(event.kind, ChangeKind::NewEntrant);
    assert_eq!(event.model, "C");
    assert_eq!(event.magnitude, 1.0);

    store.commit_run(&outcome).expect("commit diff");
    let reloaded = store.load_baseline().expect("load").expect("baseline");
    assert_eq!(reloaded, outcome.baseline);

    let history = store
        .model_history(SourceId::ArenaText, "C", 10)
        .expect("history");
    assert_eq!(history.len(), 1);
    let first_seen = store.first_seen(SourceId::ArenaText, "C").expect("first seen");
    assert!(summarize_model_history(first_seen, &history).starts_with("first_seen=2026-03-02"));
    assert_eq!(
        store.first_seen(SourceId::ArenaText, "A").expect("first seen"),
        Some(day_one)
    );
}

#[test]
fn failed_source_keeps_its_baseline_across_commits() {
    let mut store = SnapshotStore::open_in_memory().expect("open");
    let validated = Config::default().validate().expect("valid");
    let enabled = [SourceId::ArenaText, SourceId::Vellum];
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    let first = parse_scrape_batch(
        &arena_batch(json!([{"model": "A", "rank": 1}, {"model": "B", "rank": 2}])),
        &enabled,
    )
    .expect("batch");
    let seeded = run_pass(&Snapshot::new(t0), &first, &validated.thresholds, t0);
    store.commit_run(&seeded).expect("seed");

    let failing = json!({
        "arena_text": null,
        "vellum": [
            {"model": "steady", "rank": 1, "score": 71.0},
            {"model": "other", "rank": 2, "score": 65.0},
            {"model": "fresh", "rank": 3}
        ]
    })
    .to_string();
    let batch = parse_scrape_batch(&failing, &enabled).expect("batch");
    let baseline = store.load_baseline().expect("load").expect("baseline");
    let outcome = run_pass(&baseline, &batch, &validated.thresholds, t0 + Duration::hours(6));

    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].model, "fresh");
    assert!(outcome.statuses.iter().any(|s| matches!(
        s,
        SourceStatus::CarriedForward { source: SourceId::ArenaText, entries: 2, .. }
    )));

    store.commit_run(&outcome).expect("commit");
    let reloaded = store.load_baseline().expect("load").expect("baseline");
    assert_eq!(
        reloaded.entries(SourceId::ArenaText),
        baseline.entries(SourceId::ArenaText)
    );
    assert_eq!(reloaded.entries(SourceId::Vellum).len(), 3);
}

#[test]
fn unreadable_database_file_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("watch.db");
    std::fs::write(&db_path, vec![b'x'; 8192])
        .expect("write garbage");
    assert!(SnapshotStore::open(&db_path).is_err());
}
