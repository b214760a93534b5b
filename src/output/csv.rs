use anyhow::Result;

use crate::diff::ChangeEvent;
use crate::leaderboard::Snapshot;

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn events_to_csv(events: &[ChangeEvent]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "kind",
        "source",
        "model",
        "previous_rank",
        "current_rank",
        "previous_score",
        "current_score",
        "magnitude",
        "displaced",
    ])?;
    for event in events {
        writer.write_record([
            event.kind.as_str().to_string(),
            event.source.as_slug().to_string(),
            event.model.clone(),
            opt(event.previous.rank),
            opt(event.current.rank),
            opt(event.previous.score),
            opt(event.current.score),
            event.magnitude.to_string(),
            event.displaced.clone().unwrap_or_default(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn baseline_to_csv(snapshot: &Snapshot) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["source", "rank", "model", "score"])?;
    for (source, entries) in &snapshot.sources {
        for entry in entries {
            writer.write_record([
                source.as_slug().to_string(),
                entry.rank.to_string(),
                entry.model.clone(),
                opt(entry.score),
            ])?;
        }
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
