use std::collections::BTreeMap;

use crate::leaderboard::SourceId;

/// Signal/noise knobs for one leaderboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum number of positions a model must move.
    pub rank_threshold: u32,
    /// Minimum `|Δscore| / |previous score|`.
    pub score_ratio_threshold: f64,
    /// Moving into or out of the top N counts as a rank change regardless of
    /// distance.
    pub top_band: Option<u32>,
}

impl Thresholds {
    pub const DEFAULT_RANK_THRESHOLD: u32 = 2;

    pub fn new(rank_threshold: u32, score_ratio_threshold: f64) -> Self {
        Self {
            rank_threshold,
            score_ratio_threshold,
            top_band: None,
        }
    }

    pub fn with_top_band(mut self, band: u32) -> Self {
        self.top_band = Some(band);
        self
    }

    /// Defaults roughly follow each board's score scale: Elo-style ratings
    /// near 1300 move by a few points, index scores near 60 by a point or two,
    /// usage shares swing by tenths of a percent.
    pub fn default_for(source: SourceId) -> Self {
        let ratio = match source {
            SourceId::ArenaText
            | SourceId::ArenaVision
            | SourceId::ArenaCode
            | SourceId::LlmStats => 0.015,
            SourceId::Vellum | SourceId::ArtificialAnalysis => 0.03,
            SourceId::OpenRouter => 0.10,
        };
        Self::new(Self::DEFAULT_RANK_THRESHOLD, ratio)
    }
}

/// Thresholds for every known source. Built from defaults plus config
/// overrides, so lookups never miss.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    per_source: BTreeMap<SourceId, Thresholds>,
}

impl ThresholdTable {
    pub fn with_overrides(overrides: BTreeMap<SourceId, Thresholds>) -> Self {
        let mut table = Self::default();
        table.per_source.extend(overrides);
        table
    }

    /// Same thresholds for every source. Handy for tests and ad-hoc runs.
    pub fn uniform(thresholds: Thresholds) -> Self {
        Self {
            per_source: SourceId::ALL.iter().map(|s| (*s, thresholds)).collect(),
        }
    }

    pub fn for_source(&self, source: SourceId) -> Thresholds {
        self.per_source
            .get(&source)
            .copied()
            .unwrap_or_else(|| Thresholds::default_for(source))
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            per_source: SourceId::ALL
                .iter()
                .map(|s| (*s, Thresholds::default_for(*s)))
                .collect(),
        }
    }
}
