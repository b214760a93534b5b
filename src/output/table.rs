use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::diff::event::{format_rank, format_score};
use crate::diff::{ChangeEvent, ChangeKind, SourceStatus};
use crate::leaderboard::Snapshot;
use crate::snapshot::RecordedEvent;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn kind_cell(kind: ChangeKind) -> Cell {
    let color = match kind {
        ChangeKind::NewEntrant => Color::Green,
        ChangeKind::RankChange => Color::Yellow,
        ChangeKind::ScoreChange => Color::Cyan,
        ChangeKind::Vanished => Color::DarkGrey,
    };
    Cell::new(kind.as_str()).fg(color)
}

pub fn render_events_table(events: &[ChangeEvent]) -> String {
    if events.is_empty() {
        return "No significant changes detected.".to_string();
    }
    let mut table = new_table();
    table.set_header(vec![
        "Kind", "Source", "Model", "Rank", "Score", "Magnitude", "Context",
    ]);
    for event in events {
        let context = match event.kind {
            ChangeKind::NewEntrant => event
                .displaced
                .as_ref()
                .map(|m| format!("took #{} from {m}", format_rank(event.current.rank)))
                .unwrap_or_default(),
            ChangeKind::ScoreChange => event
                .relative_change
                .map(|r| format!("{:+.1}%", r * 100.0 * event.magnitude.signum()))
                .unwrap_or_default(),
            ChangeKind::RankChange | ChangeKind::Vanished => String::new(),
        };
        table.add_row(Row::from(vec![
            kind_cell(event.kind),
            Cell::new(event.source.as_slug()),
            Cell::new(&event.model),
            Cell::new(format!(
                "{} -> {}",
                format_rank(event.previous.rank),
                format_rank(event.current.rank)
            )),
            Cell::new(format!(
                "{} -> {}",
                format_score(event.previous.score),
                format_score(event.current.score)
            )),
            Cell::new(format!("{:+}", event.magnitude)),
            Cell::new(context),
        ]));
    }
    table.to_string()
}

pub fn render_status_table(statuses: &[SourceStatus]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Source", "Status", "Entries", "Dropped", "Events", "Note"]);
    for status in statuses {
        match status {
            SourceStatus::Refreshed {
                source,
                entries,
                dropped_records,
                skipped_pairs,
                events,
            } => {
                let note = if *skipped_pairs > 0 {
                    format!("{skipped_pairs} pairs skipped")
                } else {
                    String::new()
                };
                table.add_row(Row::from(vec![
                    Cell::new(source.as_slug()),
                    Cell::new("refreshed").fg(Color::Green),
                    Cell::new(entries),
                    Cell::new(dropped_records),
                    Cell::new(events),
                    Cell::new(note),
                ]));
            }
            SourceStatus::CarriedForward {
                source,
                entries,
                reason,
            } => {
                table.add_row(Row::from(vec![
                    Cell::new(source.as_slug()),
                    Cell::new("carried forward").fg(Color::Red),
                    Cell::new(entries),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(reason),
                ]));
            }
        }
    }
    table.to_string()
}

pub fn render_baseline_table(snapshot: &Snapshot) -> String {
    let mut table = new_table();
    table.set_header(vec!["Source", "Rank", "Model", "Score"]);
    for (source, entries) in &snapshot.sources {
        for entry in entries {
            table.add_row(vec![
                source.as_slug().to_string(),
                entry.rank.to_string(),
                entry.model.clone(),
                format_score(entry.score),
            ]);
        }
    }
    table.to_string()
}

pub fn render_history_table(records: &[RecordedEvent]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Recorded At", "Run", "Kind", "Rank", "Score", "Magnitude"]);
    for rec in records {
        table.add_row(Row::from(vec![
            Cell::new(rec.recorded_at.to_rfc3339()),
            Cell::new(rec.run_id),
            kind_cell(rec.event.kind),
            Cell::new(format!(
                "{} -> {}",
                format_rank(rec.event.previous.rank),
                format_rank(rec.event.current.rank)
            )),
            Cell::new(format!(
                "{} -> {}",
                format_score(rec.event.previous.score),
                format_score(rec.event.current.score)
            )),
            Cell::new(format!("{:+}", rec.event.magnitude)),
        ]));
    }
    table.to_string()
}
