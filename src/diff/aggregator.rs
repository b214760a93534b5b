use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::event::ChangeEvent;
use crate::leaderboard::{Entry, Snapshot, SourceId};

/// What happened to one source during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Refreshed {
        source: SourceId,
        entries: usize,
        dropped_records: usize,
        skipped_pairs: usize,
        events: usize,
    },
    CarriedForward {
        source: SourceId,
        entries: usize,
        reason: String,
    },
}

impl SourceStatus {
    pub fn source(&self) -> SourceId {
        match self {
            Self::Refreshed { source, .. } | Self::CarriedForward { source, .. } => *source,
        }
    }
}

/// Result of one full pass: the ordered event list for the reporter and the
/// snapshot to persist as the next baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutcome {
    pub events: Vec<ChangeEvent>,
    pub baseline: Snapshot,
    pub statuses: Vec<SourceStatus>,
}

impl RunOutcome {
    pub fn has_news(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn headline_count(&self) -> usize {
        self.events.iter().filter(|e| e.kind.is_headline()).count()
    }
}

/// Per-source counts reported alongside a refreshed source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshStats {
    pub dropped_records: usize,
    pub skipped_pairs: usize,
}

/// Collects per-source results of one run.
#[derive(Debug)]
pub struct Aggregator {
    taken_at: DateTime<Utc>,
    events: Vec<ChangeEvent>,
    sources: BTreeMap<SourceId, Vec<Entry>>,
    statuses: Vec<SourceStatus>,
}

impl Aggregator {
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            events: Vec::new(),
            sources: BTreeMap::new(),
            statuses: Vec::new(),
        }
    }

    /// Accepts a freshly scraped source: its full entry list replaces the
    /// baseline whether or not anything in it changed.
    pub fn absorb(
        &mut self,
        source: SourceId,
        entries: Vec<Entry>,
        events: Vec<ChangeEvent>,
        stats: RefreshStats,
    ) {
        self.statuses.push(SourceStatus::Refreshed {
            source,
            entries: entries.len(),
            dropped_records: stats.dropped_records,
            skipped_pairs: stats.skipped_pairs,
            events: events.len(),
        });
        self.events.extend(events);
        if !entries.is_empty() {
            self.sources.insert(source, entries);
        }
    }

    /// Keeps the previous baseline for a source whose scrape failed.
    pub fn carry_forward(&mut self, source: SourceId, previous: &[Entry], reason: impl Into<String>) {
        self.statuses.push(SourceStatus::CarriedForward {
            source,
            entries: previous.len(),
            reason: reason.into(),
        });
        if !previous.is_empty() {
            self.sources.insert(source, previous.to_vec());
        }
    }

    pub fn finish(self) -> RunOutcome {
        let mut events = self.events;
        order_events(&mut events);
        RunOutcome {
            events,
            baseline: Snapshot {
                taken_at: self.taken_at,
                sources: self.sources,
            },
            statuses: self.statuses,
        }
    }
}

/// Sorts events into report order: by kind priority, then most dramatic
/// first, then ascending rank, model name and source.
pub fn order_events(events: &mut [ChangeEvent]) {
    events.sort_by(compare_events);
}

pub fn compare_events(a: &ChangeEvent, b: &ChangeEvent) -> Ordering {
    a.kind
        .cmp(&b.kind)
        .then_with(|| b.prominence().total_cmp(&a.prominence()))
        .then_with(|| compare_rank(a.sort_rank(), b.sort_rank()))
        .then_with(|| a.model.cmp(&b.model))
        .then_with(|| a.source.cmp(&b.source))
}

fn compare_rank(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
