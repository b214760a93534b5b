use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::diff::{ChangeEvent, RunOutcome};
use crate::leaderboard::{Entry, Snapshot, SourceId};
use crate::snapshot::history::RecordedEvent;
use crate::snapshot::migrations::BASE_MIGRATION;

/// SQLite-backed baseline plus run and event history.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed creating state directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening state database: {}", path.display()))?;
        let store = Self { conn };
        store
            .migrate()
            .with_context(|| format!("state database is unreadable: {}", path.display()))?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(BASE_MIGRATION)?;
        Ok(())
    }

    /// The last committed baseline, or `None` before the first commit.
    ///
    /// Any row that cannot be decoded is an error: a damaged baseline must
    /// never be mistaken for an empty one.
    pub fn load_baseline(&self) -> Result<Option<Snapshot>> {
        let meta: Option<String> = self
            .conn
            .query_row("SELECT taken_at FROM baseline_meta WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(taken_at_raw) = meta else {
            let (entry_rows, run_rows): (i64, i64) = self.conn.query_row(
                "SELECT (SELECT COUNT(*) FROM baseline_entries), (SELECT COUNT(*) FROM runs)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            if entry_rows > 0 || run_rows > 0 {
                return Err(anyhow!(
                    "baseline metadata missing but state has {entry_rows} baseline rows and {run_rows} runs"
                ));
            }
            return Ok(None);
        };
        let taken_at = parse_timestamp(&taken_at_raw)
            .with_context(|| format!("corrupt baseline timestamp: {taken_at_raw}"))?;

        let mut stmt = self.conn.prepare(
            r#"
SELECT source, model, rank, score, details_json
FROM baseline_entries
ORDER BY source, position
"#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut sources: BTreeMap<SourceId, Vec<Entry>> = BTreeMap::new();
        for (source_raw, model, rank, score, details_json) in rows {
            let source = SourceId::from_str(&source_raw)
                .with_context(|| format!("corrupt baseline row for model {model}"))?;
            let rank = u32::try_from(rank)
                .map_err(|_| anyhow!("corrupt baseline rank {rank} for {source_raw}/{model}"))?;
            let details: Map<String, Value> = serde_json::from_str(&details_json)
                .with_context(|| format!("corrupt baseline details for {source_raw}/{model}"))?;
            sources.entry(source).or_default().push(Entry {
                model,
                rank,
                score,
                source,
                details,
            });
        }

        Ok(Some(Snapshot { taken_at, sources }))
    }

    /// Replaces the baseline and records the run's events in one
    /// transaction. Returns the new run id.
    pub fn commit_run(&mut self, outcome: &RunOutcome) -> Result<i64> {
        let committed_at = Utc::now();
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
INSERT INTO runs(taken_at, committed_at, entry_count, event_count)
VALUES (?1, ?2, ?3, ?4)
"#,
            params![
                format_timestamp(outcome.baseline.taken_at),
                format_timestamp(committed_at),
                outcome.baseline.entry_count() as i64,
                outcome.events.len() as i64
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        tx.execute("DELETE FROM baseline_entries", [])?;
        {
            let mut insert = tx.prepare(
                r#"
INSERT INTO baseline_entries(source, position, model, rank, score, details_json)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#,
            )?;
            let mut first_seen = tx.prepare(
                r#"
INSERT OR IGNORE INTO model_first_seen(source, model, first_seen_at)
VALUES (?1, ?2, ?3)
"#,
            )?;
            let taken_at = format_timestamp(outcome.baseline.taken_at);
            for (source, entries) in &outcome.baseline.sources {
                for (position, entry) in entries.iter().enumerate() {
                    first_seen.execute(params![source.as_slug(), entry.model, taken_at])?;
                    insert.execute(params![
                        source.as_slug(),
                        position as i64,
                        entry.model,
                        entry.rank,
                        entry.score,
                        serde_json::to_string(&entry.details)?
                    ])?;
                }
            }
        }
        tx.execute(
            r#"
INSERT INTO baseline_meta(id, run_id, taken_at) VALUES (1, ?1, ?2)
ON CONFLICT(id) DO UPDATE SET run_id = excluded.run_id, taken_at = excluded.taken_at
"#,
            params![run_id, format_timestamp(outcome.baseline.taken_at)],
        )?;

        {
            let mut insert = tx.prepare(
                r#"
INSERT INTO change_events(run_id, recorded_at, kind, source, model, magnitude, event_json)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#,
            )?;
            for event in &outcome.events {
                insert.execute(params![
                    run_id,
                    format_timestamp(outcome.baseline.taken_at),
                    event.kind.as_str(),
                    event.source.as_slug(),
                    event.model,
                    event.magnitude,
                    serde_json::to_string(event)?
                ])?;
            }
        }

        tx.commit()?;
        info!(
            "committed run {run_id}: {} entries, {} events",
            outcome.baseline.entry_count(),
            outcome.events.len()
        );
        Ok(run_id)
    }

    pub fn run_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// When the model first appeared in a committed baseline. Survives
    /// pruning.
    pub fn first_seen(&self, source: SourceId, model: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT first_seen_at FROM model_first_seen WHERE source = ?1 AND model = ?2",
                params![source.as_slug(), model],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| {
            parse_timestamp(&raw)
                .with_context(|| format!("corrupt first-seen timestamp for {source}/{model}"))
        })
        .transpose()
    }

    /// Recorded events for one model, newest first.
    pub fn model_history(
        &self,
        source: SourceId,
        model: &str,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT run_id, recorded_at, event_json
FROM change_events
WHERE source = ?1 AND model = ?2
ORDER BY recorded_at DESC, id DESC
LIMIT ?3
"#,
        )?;
        let rows = stmt
            .query_map(params![source.as_slug(), model, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(run_id, recorded_at, event_json)| {
                let recorded_at = parse_timestamp(&recorded_at)
                    .with_context(|| format!("corrupt event timestamp in run {run_id}"))?;
                let event: ChangeEvent = serde_json::from_str(&event_json)
                    .with_context(|| format!("corrupt event payload in run {run_id}"))?;
                Ok(RecordedEvent {
                    run_id,
                    recorded_at,
                    event,
                })
            })
            .collect()
    }

    /// Deletes history events recorded before `cutoff`. Baseline and
    /// first-seen rows are never touched.
    pub fn prune_events(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM change_events WHERE recorded_at < ?1",
            params![format_timestamp(cutoff)],
        )?;
        debug!("pruned {removed} history events older than {cutoff}");
        Ok(removed)
    }
}

/// Fixed-width UTC so stored timestamps sort lexically.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    use crate::diff::classifier::{classify_pair, new_entrant_event};
    use crate::diff::{Aggregator, ChangeKind, MatchedPair, RefreshStats, Thresholds};
    use crate::snapshot::history::summarize_model_history;
    use crate::leaderboard::{Entry, Snapshot, SourceId};
    use crate::snapshot::store::SnapshotStore;

    fn sample_snapshot() -> Snapshot {
        let details = json!({
            "votes": 4821,
            "organization": "Anthropic",
            "ci": [-4.5, 5.25],
            "license": null
        });
        let at = Utc.with_ymd_and_hms(2026, 2, 10, 8, 30, 15).unwrap();
        Snapshot::new(at)
            .with_source(
                SourceId::ArenaText,
                vec![
                    Entry::new(SourceId::ArenaText, "claude-opus", 1)
                        .with_score(1502.25)
                        .with_details(details.as_object().cloned().unwrap()),
                    Entry::new(SourceId::ArenaText, "gpt-5.2", 2).with_score(1498.0),
                ],
            )
            .with_source(
                SourceId::Vellum,
                vec![Entry::new(SourceId::Vellum, "no-score-model", 3)],
            )
    }

    fn outcome_for(snapshot: &Snapshot, events: Vec<crate::diff::ChangeEvent>) -> crate::diff::RunOutcome {
        let mut aggregator = Aggregator::new(snapshot.taken_at);
        let mut first = true;
        for (source, entries) in &snapshot.sources {
            let source_events = if first { events.clone() } else { Vec::new() };
            first = false;
            aggregator.absorb(*source, entries.clone(), source_events, RefreshStats::default());
        }
        aggregator.finish()
    }

    #[test]
    fn empty_store_has_no_baseline() {
        let store = SnapshotStore::open_in_memory().expect("open store");
        assert!(store.load_baseline().expect("load").is_none());
        assert_eq!(store.run_count().expect("count"), 0);
    }

    #[test]
    fn baseline_round_trips_losslessly() {
        let mut store = SnapshotStore::open_in_memory().expect("open store");
        let snapshot = sample_snapshot();
        store
            .commit_run(&outcome_for(&snapshot, Vec::new()))
            .expect("commit");

        let loaded = store.load_baseline().expect("load").expect("baseline exists");
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn commit_replaces_previous_baseline() {
        let mut store = SnapshotStore::open_in_memory().expect("open store");
        store
            .commit_run(&outcome_for(&sample_snapshot(), Vec::new()))
            .expect("first commit");

        let next = Snapshot::new(Utc::now()).with_source(
            SourceId::OpenRouter,
            vec![Entry::new(SourceId::OpenRouter, "x", 1)],
        );
        store
            .commit_run(&outcome_for(&next, Vec::new()))
            .expect("second commit");

        let loaded = store.load_baseline().expect("load").expect("baseline exists");
        assert_eq!(loaded.entry_count(), 1);
        assert!(loaded.entries(SourceId::ArenaText).is_empty());
        assert_eq!(store.run_count().expect("count"), 2);
    }

    #[test]
    fn corrupt_row_is_an_error_not_an_empty_baseline() {
        let mut store = SnapshotStore::open_in_memory().expect("open store");
        store
            .commit_run(&outcome_for(&sample_snapshot(), Vec::new()))
            .expect("commit");
        store
            .conn
            .execute("UPDATE baseline_entries SET details_json = '{broken'", [])
            .expect("damage row");

        assert!(store.load_baseline().is_err());
    }

    #[test]
    fn missing_baseline_meta_with_rows_is_an_error() {
        let mut store = SnapshotStore::open_in_memory().expect("open store");
        store
            .commit_run(&outcome_for(&sample_snapshot(), Vec::new()))
            .expect("commit");
        store
            .conn
            .execute("DELETE FROM baseline_meta", [])
            .expect("drop meta");

        let err = store.load_baseline().expect_err("damaged state must not load");
        assert!(err.to_string().contains("baseline metadata missing"));
    }

    #[test]
    fn first_sighting_survives_seed_and_pruning() {
        let mut store = SnapshotStore::open_in_memory().expect("open store");
        let seeded_at = Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap();
        let before = Entry::new(SourceId::Vellum, "A", 5).with_score(50.0);
        let seed = Snapshot::new(seeded_at).with_source(SourceId::Vellum, vec![before.clone()]);
        store
            .commit_run(&outcome_for(&seed, Vec::new()))
            .expect("seed commit");

        let climbed_at = seeded_at + Duration::days(1);
        let after = Entry::new(SourceId::Vellum, "A", 1).with_score(60.0);
        let events = classify_pair(
            &MatchedPair {
                previous: &before,
                current: &after,
            },
            &Thresholds::new(2, 0.03),
        )
        .expect("classify");
        let next = Snapshot::new(climbed_at).with_source(SourceId::Vellum, vec![after]);
        store
            .commit_run(&outcome_for(&next, events))
            .expect("diff commit");

        let history = store
            .model_history(SourceId::Vellum, "A", 10)
            .expect("history");
        let first_seen = store.first_seen(SourceId::Vellum, "A").expect("first seen");
        assert_eq!(first_seen, Some(seeded_at));
        let summary = summarize_model_history(first_seen, &history);
        assert!(summary.starts_with("first_seen=2026-02-01 | rank:5->1"));

        store
            .prune_events(climbed_at + Duration::days(1))
            .expect("prune");
        assert!(store
            .model_history(SourceId::Vellum, "A", 10)
            .expect("history")
            .is_empty());
        assert_eq!(
            store.first_seen(SourceId::Vellum, "A").expect("first seen"),
            Some(seeded_at)
        );
    }

    #[test]
    fn history_is_recorded_and_pruned() {
        let mut store = SnapshotStore::open_in_memory().expect("open store");
        let snapshot = sample_snapshot();
        let newcomer = snapshot.entries(SourceId::ArenaText)[1].clone();
        let event = new_entrant_event(&newcomer, &[]);
        store
            .commit_run(&outcome_for(&snapshot, vec![event]))
            .expect("commit");

        let history = store
            .model_history(SourceId::ArenaText, "gpt-5.2", 10)
            .expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event.kind, ChangeKind::NewEntrant);
        assert_eq!(history[0].recorded_at, snapshot.taken_at);

        let removed = store
            .prune_events(snapshot.taken_at + Duration::days(1))
            .expect("prune");
        assert_eq!(removed, 1);
        assert!(store
            .model_history(SourceId::ArenaText, "gpt-5.2", 10)
            .expect("history")
            .is_empty());
        assert!(store.load_baseline().expect("load").is_some());
    }
}
