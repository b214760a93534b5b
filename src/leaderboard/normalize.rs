use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::leaderboard::{Entry, SourceId};

const MODEL_PLACEHOLDERS: [&str; 3] = ["none", "unknown", "null"];
const SOURCE_TAG_KEY: &str = "source";
const NESTED_DETAILS_KEY: &str = "details";

/// Candidate field names for one source, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct RecordProfile {
    pub model_keys: &'static [&'static str],
    pub rank_keys: &'static [&'static str],
    pub score_keys: &'static [&'static str],
}

impl SourceId {
    pub fn record_profile(&self) -> RecordProfile {
        match self {
            Self::ArenaText | Self::ArenaVision | Self::ArenaCode => RecordProfile {
                model_keys: &["modelDisplayName", "model", "name"],
                rank_keys: &["rank", "position"],
                score_keys: &["rating", "score"],
            },
            Self::Vellum => RecordProfile {
                model_keys: &["model", "name"],
                rank_keys: &["rank", "position"],
                score_keys: &["score", "raw_score"],
            },
            Self::ArtificialAnalysis => RecordProfile {
                model_keys: &["name", "model"],
                rank_keys: &["rank", "position"],
                score_keys: &["intelligence_index", "score"],
            },
            Self::LlmStats => RecordProfile {
                model_keys: &["name", "model"],
                rank_keys: &["rank", "position"],
                score_keys: &["elo", "score", "rating", "overall"],
            },
            Self::OpenRouter => RecordProfile {
                model_keys: &["name", "model"],
                rank_keys: &["rank", "position"],
                score_keys: &["usage_share_pct", "score"],
            },
        }
    }
}

/// Why a single raw record did not become an [`Entry`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordDefect {
    #[error("record #{index} is not an object")]
    NotAnObject { index: usize },
    #[error("record #{index} has no usable model name")]
    MissingModel { index: usize },
    #[error("record #{index} ({model}) has no positive integer rank")]
    MissingRank { index: usize, model: String },
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub entries: Vec<Entry>,
    pub dropped: Vec<RecordDefect>,
}

/// Maps one source's raw scraped records into canonical entries.
///
/// Records without a model or rank are dropped and reported in
/// [`NormalizeOutcome::dropped`]. When two records share a model name the
/// later one wins. The result is ordered by rank, then model.
///
/// Every other record field lands in `details` unchanged, with two
/// exceptions: a `source` tag is dropped since the entry already carries its
/// source, and a nested `details` object is flattened into the top level
/// (top-level keys win on collision).
pub fn normalize_records(source: SourceId, records: &[Value]) -> NormalizeOutcome {
    let profile = source.record_profile();
    let mut by_model: BTreeMap<String, Entry> = BTreeMap::new();
    let mut dropped = Vec::new();

    for (index, record) in records.iter().enumerate() {
        match normalize_record(source, &profile, index, record) {
            Ok(entry) => {
                if let Some(previous) = by_model.insert(entry.model.clone(), entry) {
                    debug!(
                        "{source}: duplicate model {} (was rank {}), keeping later record",
                        previous.model, previous.rank
                    );
                }
            }
            Err(defect) => {
                warn!("{source}: dropping record: {defect}");
                dropped.push(defect);
            }
        }
    }

    let mut entries: Vec<Entry> = by_model.into_values().collect();
    entries.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.model.cmp(&b.model)));
    NormalizeOutcome { entries, dropped }
}

fn normalize_record(
    source: SourceId,
    profile: &RecordProfile,
    index: usize,
    record: &Value,
) -> Result<Entry, RecordDefect> {
    let Some(object) = record.as_object() else {
        return Err(RecordDefect::NotAnObject { index });
    };

    let Some((model_key, model)) = model_from_keys(object, profile.model_keys) else {
        return Err(RecordDefect::MissingModel { index });
    };
    let Some((rank_key, rank)) = rank_from_keys(object, profile.rank_keys) else {
        return Err(RecordDefect::MissingRank { index, model });
    };
    let score = score_from_keys(object, profile.score_keys);

    let mut details = Map::new();
    if let Some(Value::Object(nested)) = object.get(NESTED_DETAILS_KEY) {
        details.extend(nested.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    for (key, value) in object {
        if key == model_key || key == rank_key || key == SOURCE_TAG_KEY {
            continue;
        }
        if key == NESTED_DETAILS_KEY && value.is_object() {
            continue;
        }
        details.insert(key.clone(), value.clone());
    }

    Ok(Entry {
        model,
        rank,
        score,
        source,
        details,
    })
}

fn model_from_keys<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<(&'a str, String)> {
    for key in keys {
        let Some((found, value)) = get_case_insensitive(object, key) else {
            continue;
        };
        let candidate = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        if candidate.is_empty() || is_placeholder(&candidate) {
            continue;
        }
        return Some((found, candidate));
    }
    None
}

fn rank_from_keys<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<(&'a str, u32)> {
    for key in keys {
        let Some((found, value)) = get_case_insensitive(object, key) else {
            continue;
        };
        if let Some(rank) = parse_rank(value) {
            return Some((found, rank));
        }
    }
    None
}

fn score_from_keys(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    for key in keys {
        let Some((found, value)) = get_case_insensitive(object, key) else {
            continue;
        };
        match parse_number(value) {
            Some(score) => return Some(score),
            None if !value.is_null() => debug!("ignoring non-numeric score in {found}: {value}"),
            None => {}
        }
    }
    None
}

fn get_case_insensitive<'a>(
    object: &'a Map<String, Value>,
    key: &str,
) -> Option<(&'a str, &'a Value)> {
    if let Some((k, v)) = object.get_key_value(key) {
        return Some((k.as_str(), v));
    }
    object
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(k, v)| (k.as_str(), v))
}

fn is_placeholder(model: &str) -> bool {
    MODEL_PLACEHOLDERS
        .iter()
        .any(|p| model.eq_ignore_ascii_case(p))
}

pub(crate) fn parse_rank(value: &Value) -> Option<u32> {
    let rank = match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => v,
            None => {
                let f = n.as_f64()?;
                if f.fract() != 0.0 || f < 0.0 {
                    return None;
                }
                f as u64
            }
        },
        Value::String(s) => s.trim().trim_start_matches('#').trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(rank).ok().filter(|r| *r >= 1)
}

pub(crate) fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let sanitized = s.trim().replace([',', '%', '_'], "");
            sanitized.parse::<f64>().ok()
        }
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}
