pub mod batch;
pub mod normalize;
pub mod source;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use batch::{parse_scrape_batch, BatchError};
pub use normalize::{normalize_records, NormalizeOutcome, RecordDefect, RecordProfile};
pub use source::{SourceId, SourceParseError};

/// One model's position on one leaderboard at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub model: String,
    pub rank: u32,
    #[serde(default)]
    pub score: Option<f64>,
    pub source: SourceId,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl Entry {
    pub fn new(source: SourceId, model: impl Into<String>, rank: u32) -> Self {
        Self {
            model: model.into(),
            rank,
            score: None,
            source,
            details: Map::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }
}

/// All leaderboards as observed by one run. Each list is ordered by rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub sources: BTreeMap<SourceId, Vec<Entry>>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            sources: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: SourceId, entries: Vec<Entry>) -> Self {
        self.sources.insert(source, entries);
        self
    }

    pub fn entries(&self, source: SourceId) -> &[Entry] {
        self.sources
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn entry_count(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}

/// Output of the scraping collaborator for one source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    Scraped(Vec<Value>),
    Failed(String),
}

pub type ScrapeBatch = BTreeMap<SourceId, SourcePayload>;
