use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::leaderboard::{ScrapeBatch, SourceId, SourcePayload};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("scrape batch is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scrape batch must be a JSON object keyed by source")]
    NotAnObject,
    #[error("unknown source in scrape batch: {0}")]
    UnknownSource(String),
    #[error("{0}: payload must be an array of records, null, or {{\"error\": ...}}")]
    BadPayload(SourceId),
}

/// Parses `{ "<source>": [records] | null | {"error": "..."} }`.
///
/// Enabled sources absent from the document are marked failed; sources that
/// are present but not enabled are ignored.
pub fn parse_scrape_batch(raw: &str, enabled: &[SourceId]) -> Result<ScrapeBatch, BatchError> {
    let document: Value = serde_json::from_str(raw)?;
    let Value::Object(map) = document else {
        return Err(BatchError::NotAnObject);
    };

    let mut batch = ScrapeBatch::new();
    for (key, payload) in map {
        let source =
            SourceId::from_str(&key).map_err(|_| BatchError::UnknownSource(key.clone()))?;
        if !enabled.contains(&source) {
            debug!("{source}: present in batch but not enabled, ignoring");
            continue;
        }
        let payload = match payload {
            Value::Array(records) => SourcePayload::Scraped(records),
            Value::Null => SourcePayload::Failed("scraper returned no data".to_string()),
            Value::Object(obj) => match obj.get("error").and_then(Value::as_str) {
                Some(reason) => SourcePayload::Failed(reason.to_string()),
                None => return Err(BatchError::BadPayload(source)),
            },
            _ => return Err(BatchError::BadPayload(source)),
        };
        batch.insert(source, payload);
    }

    for source in enabled {
        batch
            .entry(*source)
            .or_insert_with(|| SourcePayload::Failed("missing from scrape batch".to_string()));
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::leaderboard::batch::{parse_scrape_batch, BatchError};
    use crate::leaderboard::{SourceId, SourcePayload};

    #[test]
    fn parses_records_nulls_and_error_objects() {
        let raw = json!({
            "arena_text": [{"model": "a", "rank": 1}],
            "vellum": null,
            "openrouter": {"error": "timeout"},
        })
        .to_string();
        let batch = parse_scrape_batch(
            &raw,
            &[SourceId::ArenaText, SourceId::Vellum, SourceId::OpenRouter],
        )
        .expect("batch");

        assert!(matches!(
            batch.get(&SourceId::ArenaText),
            Some(SourcePayload::Scraped(records)) if records.len() == 1
        ));
        assert!(matches!(batch.get(&SourceId::Vellum), Some(SourcePayload::Failed(_))));
        assert_eq!(
            batch.get(&SourceId::OpenRouter),
            Some(&SourcePayload::Failed("timeout".to_string()))
        );
    }

    #[test]
    fn missing_enabled_source_is_a_failure_and_disabled_is_ignored() {
        let raw = json!({"vellum": [], "llmstats": []}).to_string();
        let batch = parse_scrape_batch(&raw, &[SourceId::Vellum, SourceId::ArenaCode])
            .expect("batch");
        assert_eq!(batch.len(), 2);
        assert!(!batch.contains_key(&SourceId::LlmStats));
        assert!(matches!(
            batch.get(&SourceId::ArenaCode),
            Some(SourcePayload::Failed(reason)) if reason.contains("missing")
        ));
    }

    #[test]
    fn rejects_unknown_sources_and_bad_shapes() {
        let unknown = parse_scrape_batch(r#"{"hf_open_llm": []}"#, &SourceId::ALL);
        assert!(matches!(unknown, Err(BatchError::UnknownSource(key)) if key == "hf_open_llm"));

        let scalar = parse_scrape_batch(r#"{"vellum": 3}"#, &SourceId::ALL);
        assert!(matches!(scalar, Err(BatchError::BadPayload(SourceId::Vellum))));

        assert!(matches!(
            parse_scrape_batch("[]", &SourceId::ALL),
            Err(BatchError::NotAnObject)
        ));
    }
}
