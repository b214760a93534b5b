use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::event::{format_rank, format_score};
use crate::diff::{ChangeEvent, ChangeKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedEvent {
    pub run_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub event: ChangeEvent,
}

pub fn history_cutoff(now: DateTime<Utc>, lookback_days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(lookback_days))
}

/// One-line timeline for a model, e.g.
/// `first_seen=2026-02-10 | rank:4->1 | moves(rank=2,score=1) | last_change=...`.
///
/// `first_seen` is the stored first-sighting time; without it the earliest
/// surviving NEW_ENTRANT event is used.
pub fn summarize_model_history(
    first_seen: Option<DateTime<Utc>>,
    records: &[RecordedEvent],
) -> String {
    if records.is_empty() {
        return match first_seen {
            Some(at) => format!("first_seen={} | no recorded changes", at.format("%Y-%m-%d")),
            None => "No history records found.".to_string(),
        };
    }

    let mut ordered: Vec<&RecordedEvent> = records.iter().collect();
    ordered.sort_by_key(|r| (r.recorded_at, r.run_id));

    let first_seen = first_seen
        .or_else(|| {
            ordered
                .iter()
                .find(|r| r.event.kind == ChangeKind::NewEntrant)
                .map(|r| r.recorded_at)
        })
        .map(|at| at.format("%Y-%m-%d").to_string());

    let mut rank_moves = 0usize;
    let mut score_moves = 0usize;
    let mut first_rank = None;
    let mut last_rank = None;
    let mut first_score = None;
    let mut last_score = None;
    for record in &ordered {
        let event = &record.event;
        match event.kind {
            ChangeKind::RankChange => rank_moves += 1,
            ChangeKind::ScoreChange => score_moves += 1,
            ChangeKind::NewEntrant | ChangeKind::Vanished => {}
        }
        if first_rank.is_none() {
            first_rank = event.previous.rank.or(event.current.rank);
        }
        if first_score.is_none() {
            first_score = event.previous.score.or(event.current.score);
        }
        last_rank = event.current.rank;
        last_score = event.current.score.or(last_score);
    }

    let mut parts = vec![match first_seen {
        Some(date) => format!("first_seen={date}"),
        None => "first_seen=?".to_string(),
    }];
    if first_rank != last_rank {
        parts.push(format!(
            "rank:{}->{}",
            format_rank(first_rank),
            last_rank.map(|r| r.to_string()).unwrap_or_else(|| "gone".to_string())
        ));
    }
    if first_score != last_score && last_score.is_some() {
        parts.push(format!(
            "score:{}->{}",
            format_score(first_score),
            format_score(last_score)
        ));
    }
    parts.push(format!("moves(rank={rank_moves},score={score_moves})"));
    if let Some(latest) = ordered.last() {
        parts.push(format!(
            "last_change={} ({})",
            latest.recorded_at.format("%Y-%m-%d %H:%M"),
            latest.event.kind
        ));
    }
    parts.join(" | ")
}
