use thiserror::Error;

use crate::diff::event::{ChangeEvent, ChangeKind, Observation};
use crate::diff::matcher::MatchedPair;
use crate::diff::thresholds::Thresholds;
use crate::leaderboard::Entry;

/// Floor for the score-ratio denominator.
pub const SCORE_EPSILON: f64 = 1e-9;

/// A matched pair that cannot be compared.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PairDefect {
    #[error("{model}: rank {rank} is not a valid position")]
    InvalidRank { model: String, rank: u32 },
    #[error("{model}: score {score} is not a finite number")]
    InvalidScore { model: String, score: f64 },
}

/// Classifies one matched pair. Returns zero, one or two events: a rank
/// change and a score change are judged independently.
pub fn classify_pair(
    pair: &MatchedPair<'_>,
    thresholds: &Thresholds,
) -> Result<Vec<ChangeEvent>, PairDefect> {
    validate(pair.previous)?;
    validate(pair.current)?;

    let mut events = Vec::new();
    if let Some(delta) = significant_rank_delta(pair, thresholds) {
        events.push(matched_event(pair, ChangeKind::RankChange, delta as f64, None));
    }
    if let Some((delta, ratio)) = significant_score_delta(pair, thresholds) {
        events.push(matched_event(pair, ChangeKind::ScoreChange, delta, Some(ratio)));
    }
    Ok(events)
}

/// `previous - current`, positive when the model climbed.
pub fn rank_delta(previous: &Entry, current: &Entry) -> i64 {
    i64::from(previous.rank) - i64::from(current.rank)
}

/// `(current - previous, |delta| / max(|previous|, ε))` when both scores exist.
pub fn score_delta(previous: &Entry, current: &Entry) -> Option<(f64, f64)> {
    let (Some(before), Some(after)) = (previous.score, current.score) else {
        return None;
    };
    let delta = after - before;
    let ratio = delta.abs() / before.abs().max(SCORE_EPSILON);
    Some((delta, ratio))
}

fn significant_rank_delta(pair: &MatchedPair<'_>, thresholds: &Thresholds) -> Option<i64> {
    let delta = rank_delta(pair.previous, pair.current);
    if delta == 0 {
        return None;
    }
    if delta.unsigned_abs() >= u64::from(thresholds.rank_threshold) {
        return Some(delta);
    }
    let band = thresholds.top_band?;
    let was_inside = pair.previous.rank <= band;
    let is_inside = pair.current.rank <= band;
    (was_inside != is_inside).then_some(delta)
}

fn significant_score_delta(pair: &MatchedPair<'_>, thresholds: &Thresholds) -> Option<(f64, f64)> {
    let (delta, ratio) = score_delta(pair.previous, pair.current)?;
    (ratio >= thresholds.score_ratio_threshold).then_some((delta, ratio))
}

fn validate(entry: &Entry) -> Result<(), PairDefect> {
    if entry.rank == 0 {
        return Err(PairDefect::InvalidRank {
            model: entry.model.clone(),
            rank: entry.rank,
        });
    }
    if let Some(score) = entry.score {
        if !score.is_finite() {
            return Err(PairDefect::InvalidScore {
                model: entry.model.clone(),
                score,
            });
        }
    }
    Ok(())
}

fn matched_event(
    pair: &MatchedPair<'_>,
    kind: ChangeKind,
    magnitude: f64,
    relative_change: Option<f64>,
) -> ChangeEvent {
    ChangeEvent {
        kind,
        source: pair.current.source,
        model: pair.current.model.clone(),
        previous: Observation::of(pair.previous),
        current: Observation::of(pair.current),
        magnitude,
        relative_change,
        displaced: None,
        details: pair.current.details.clone(),
    }
}

/// A model's first appearance. `baseline` is the same source's previous list,
/// used to name whoever held that rank before.
pub fn new_entrant_event(entry: &Entry, baseline: &[Entry]) -> ChangeEvent {
    let displaced = baseline
        .iter()
        .find(|e| e.rank == entry.rank && e.model != entry.model)
        .map(|e| e.model.clone());
    ChangeEvent {
        kind: ChangeKind::NewEntrant,
        source: entry.source,
        model: entry.model.clone(),
        previous: Observation::default(),
        current: Observation::of(entry),
        magnitude: f64::from(entry.rank),
        relative_change: None,
        displaced,
        details: entry.details.clone(),
    }
}

pub fn vanished_event(entry: &Entry) -> ChangeEvent {
    ChangeEvent {
        kind: ChangeKind::Vanished,
        source: entry.source,
        model: entry.model.clone(),
        previous: Observation::of(entry),
        current: Observation::default(),
        magnitude: f64::from(entry.rank),
        relative_change: None,
        displaced: None,
        details: entry.details.clone(),
    }
}
