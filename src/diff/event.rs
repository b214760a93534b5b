use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::leaderboard::{Entry, SourceId};

/// Variant order is the report priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    NewEntrant,
    RankChange,
    ScoreChange,
    Vanished,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewEntrant => "NEW_ENTRANT",
            Self::RankChange => "RANK_CHANGE",
            Self::ScoreChange => "SCORE_CHANGE",
            Self::Vanished => "VANISHED",
        }
    }

    /// Vanished entries are informational; everything else is headline material.
    pub fn is_headline(&self) -> bool {
        !matches!(self, Self::Vanished)
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rank and score of an entry as seen on one side of the comparison.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub rank: Option<u32>,
    pub score: Option<f64>,
}

impl Observation {
    pub fn of(entry: &Entry) -> Self {
        Self {
            rank: Some(entry.rank),
            score: entry.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub source: SourceId,
    pub model: String,
    pub previous: Observation,
    pub current: Observation,
    pub magnitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displaced: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl ChangeEvent {
    /// Rank used for tie-breaking: current rank, or the last known one for
    /// entries that are gone.
    pub fn sort_rank(&self) -> Option<u32> {
        self.current.rank.or(self.previous.rank)
    }

    /// Higher means more dramatic within the event's kind.
    ///
    /// Rank and score changes rank by absolute movement. New entrants and
    /// vanished entries carry a rank as magnitude, so a smaller rank is more
    /// notable.
    pub fn prominence(&self) -> f64 {
        match self.kind {
            ChangeKind::RankChange | ChangeKind::ScoreChange => self.magnitude.abs(),
            ChangeKind::NewEntrant | ChangeKind::Vanished => -self.magnitude,
        }
    }

    pub fn summary(&self) -> String {
        match self.kind {
            ChangeKind::NewEntrant => {
                let rank = self.current.rank.unwrap_or_default();
                match &self.displaced {
                    Some(displaced) => format!(
                        "[{}] NEW: {} debuted at #{rank}, likely pushing {displaced} down",
                        self.source.as_slug(),
                        self.model
                    ),
                    None => format!(
                        "[{}] NEW: {} debuted at #{rank}",
                        self.source.as_slug(),
                        self.model
                    ),
                }
            }
            ChangeKind::RankChange => {
                let direction = if self.magnitude > 0.0 { "CLIMBED" } else { "DROPPED" };
                format!(
                    "[{}] {} {direction} {} spots (was #{}, now #{})",
                    self.source.as_slug(),
                    self.model,
                    self.magnitude.abs(),
                    format_rank(self.previous.rank),
                    format_rank(self.current.rank)
                )
            }
            ChangeKind::ScoreChange => format!(
                "[{}] {} score {} -> {} ({:+.2})",
                self.source.as_slug(),
                self.model,
                format_score(self.previous.score),
                format_score(self.current.score),
                self.magnitude
            ),
            ChangeKind::Vanished => format!(
                "[{}] {} left the board (was #{})",
                self.source.as_slug(),
                self.model,
                format_rank(self.previous.rank)
            ),
        }
    }
}

pub fn format_rank(rank: Option<u32>) -> String {
    rank.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string())
}

pub fn format_score(score: Option<f64>) -> String {
    score
        .map(|s| format!("{s:.2}"))
        .unwrap_or_else(|| "-".to_string())
}
