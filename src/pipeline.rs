//! One change-detection pass over every leaderboard.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::diff::{
    classify_pair, match_entries, new_entrant_event, vanished_event, Aggregator, RefreshStats,
    RunOutcome, ThresholdTable,
};
use crate::leaderboard::{normalize_records, ScrapeBatch, Snapshot, SourceId, SourcePayload};

/// Diffs a scrape batch against the baseline.
///
/// Every source present in either input is visited once, in source order. A
/// source whose payload is missing, failed, or normalizes to nothing keeps its
/// baseline entries. Never fails: record and pair defects are logged and
/// skipped.
pub fn run_pass(
    baseline: &Snapshot,
    batch: &ScrapeBatch,
    thresholds: &ThresholdTable,
    taken_at: DateTime<Utc>,
) -> RunOutcome {
    let mut aggregator = Aggregator::new(taken_at);
    let sources: BTreeSet<SourceId> = batch
        .keys()
        .chain(baseline.sources.keys())
        .copied()
        .collect();

    for source in sources {
        let previous = baseline.entries(source);
        let records = match batch.get(&source) {
            Some(SourcePayload::Scraped(records)) => records,
            Some(SourcePayload::Failed(reason)) => {
                warn!("{source}: scrape failed ({reason}), keeping previous baseline");
                aggregator.carry_forward(source, previous, reason.clone());
                continue;
            }
            None => {
                warn!("{source}: no payload this run, keeping previous baseline");
                aggregator.carry_forward(source, previous, "no payload this run");
                continue;
            }
        };

        let normalized = normalize_records(source, records);
        if normalized.entries.is_empty() {
            warn!(
                "{source}: no usable entries ({} records, {} dropped), keeping previous baseline",
                records.len(),
                normalized.dropped.len()
            );
            aggregator.carry_forward(source, previous, "no usable entries");
            continue;
        }

        let source_thresholds = thresholds.for_source(source);
        let matched = match_entries(source, previous, &normalized.entries);
        let mut events = Vec::new();
        let mut skipped_pairs = 0usize;

        for entry in &matched.new {
            events.push(new_entrant_event(entry, previous));
        }
        for pair in &matched.matched {
            match classify_pair(pair, &source_thresholds) {
                Ok(found) => events.extend(found),
                Err(defect) => {
                    warn!("{source}: skipping pair: {defect}");
                    skipped_pairs += 1;
                }
            }
        }
        for entry in &matched.vanished {
            events.push(vanished_event(entry));
        }

        debug!(
            "{source}: {} matched, {} new, {} vanished, {} events",
            matched.matched.len(),
            matched.new.len(),
            matched.vanished.len(),
            events.len()
        );

        let stats = RefreshStats {
            dropped_records: normalized.dropped.len(),
            skipped_pairs,
        };
        aggregator.absorb(source, normalized.entries, events, stats);
    }

    let outcome = aggregator.finish();
    info!(
        "pass complete: {} events ({} headline), {} entries in new baseline",
        outcome.events.len(),
        outcome.headline_count(),
        outcome.baseline.entry_count()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use crate::diff::{ChangeKind, SourceStatus, ThresholdTable, Thresholds};
    use crate::leaderboard::{Entry, ScrapeBatch, Snapshot, SourceId, SourcePayload};
    use crate::pipeline::run_pass;

    fn table(rank_threshold: u32) -> ThresholdTable {
        ThresholdTable::uniform(Thresholds::new(rank_threshold, 0.05))
    }

    fn baseline(source: SourceId, rows: &[(&str, u32)]) -> Snapshot {
        let entries = rows
            .iter()
            .map(|(model, rank)| Entry::new(source, *model, *rank))
            .collect();
        Snapshot::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()).with_source(source, entries)
    }

    fn scraped(rows: &[(&str, u32)]) -> SourcePayload {
        SourcePayload::Scraped(
            rows.iter()
                .map(|(model, rank)| json!({"model": model, "rank": rank}))
                .collect(),
        )
    }

    #[test]
    fn identical_snapshot_produces_no_events() {
        let rows = [("A", 1), ("B", 2), ("C", 3)];
        let base = baseline(SourceId::Vellum, &rows);
        let batch = ScrapeBatch::from([(SourceId::Vellum, scraped(&rows))]);

        let outcome = run_pass(&base, &batch, &table(2), Utc::now());
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.baseline.entries(SourceId::Vellum), base.entries(SourceId::Vellum));
    }

    #[test]
    fn new_model_is_the_only_event() {
        let base = baseline(SourceId::Vellum, &[("A", 3), ("B", 5)]);
        let batch = ScrapeBatch::from([(
            SourceId::Vellum,
            scraped(&[("A", 3), ("B", 5), ("C", 1)]),
        )]);

        let outcome = run_pass(&base, &batch, &table(2), Utc::now());
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].kind, ChangeKind::NewEntrant);
        assert_eq!(outcome.events[0].model, "C");
        assert_eq!(outcome.events[0].magnitude, 1.0);
    }

    #[test]
    fn big_climb_is_a_rank_change() {
        let base = baseline(SourceId::Vellum, &[("A", 5)]);
        let batch = ScrapeBatch::from([(SourceId::Vellum, scraped(&[("A", 1)]))]);

        let outcome = run_pass(&base, &batch, &table(2), Utc::now());
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].kind, ChangeKind::RankChange);
        assert_eq!(outcome.events[0].magnitude, 4.0);
    }

    #[test]
    fn failed_source_keeps_baseline_while_healthy_source_reports() {
        let base = baseline(SourceId::Vellum, &[("A", 1), ("B", 2)])
            .with_source(SourceId::OpenRouter, vec![Entry::new(SourceId::OpenRouter, "X", 1)]);
        let batch = ScrapeBatch::from([
            (SourceId::Vellum, SourcePayload::Scraped(Vec::new())),
            (SourceId::OpenRouter, scraped(&[("X", 1), ("Y", 2)])),
        ]);

        let outcome = run_pass(&base, &batch, &table(2), Utc::now());
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].source, SourceId::OpenRouter);
        assert_eq!(outcome.events[0].model, "Y");
        assert_eq!(outcome.baseline.entries(SourceId::Vellum), base.entries(SourceId::Vellum));
        assert!(outcome.statuses.iter().any(|s| matches!(
            s,
            SourceStatus::CarriedForward { source: SourceId::Vellum, .. }
        )));
    }

    #[test]
    fn source_missing_from_batch_is_carried_forward() {
        let base = baseline(SourceId::LlmStats, &[("A", 1)]);
        let outcome = run_pass(&base, &ScrapeBatch::new(), &table(2), Utc::now());
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.baseline.entries(SourceId::LlmStats).len(), 1);
    }

    #[test]
    fn dropped_model_is_reported_as_vanished_last() {
        let base = baseline(SourceId::ArenaText, &[("A", 1), ("B", 2), ("C", 3)]);
        let batch = ScrapeBatch::from([(
            SourceId::ArenaText,
            scraped(&[("A", 1), ("C", 2), ("D", 3)]),
        )]);

        let outcome = run_pass(&base, &batch, &table(2), Utc::now());
        let kinds: Vec<_> = outcome
            .events
            .iter()
            .map(|e| (e.kind, e.model.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![(ChangeKind::NewEntrant, "D"), (ChangeKind::Vanished, "B")]
        );
    }

    #[test]
    fn same_input_gives_same_output() {
        let base = baseline(SourceId::ArenaCode, &[("A", 1), ("B", 2), ("C", 9)]);
        let batch = ScrapeBatch::from([(
            SourceId::ArenaCode,
            scraped(&[("C", 1), ("A", 4), ("B", 7), ("E", 2)]),
        )]);
        let at = Utc::now();

        let first = run_pass(&base, &batch, &table(2), at);
        let second = run_pass(&base, &batch, &table(2), at);
        assert_eq!(first, second);
    }
}
