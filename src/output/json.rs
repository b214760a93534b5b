use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diff::{ChangeEvent, RunOutcome, SourceStatus};

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Machine-readable report for one diff run. Omits the new baseline, which
/// is available through the `baseline` command.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub taken_at: DateTime<Utc>,
    pub headline_count: usize,
    pub events: &'a [ChangeEvent],
    pub sources: &'a [SourceStatus],
}

impl<'a> From<&'a RunOutcome> for RunReport<'a> {
    fn from(outcome: &'a RunOutcome) -> Self {
        Self {
            taken_at: outcome.baseline.taken_at,
            headline_count: outcome.headline_count(),
            events: &outcome.events,
            sources: &outcome.statuses,
        }
    }
}

pub fn render_run_report(outcome: &RunOutcome) -> Result<String> {
    render_json(&RunReport::from(outcome))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    use crate::diff::classifier::{new_entrant_event, vanished_event};
    use crate::diff::{Aggregator, RefreshStats};
    use crate::leaderboard::{Entry, SourceId};
    use crate::output::json::render_run_report;

    #[test]
    fn report_counts_headlines_and_lists_sources() {
        let mut aggregator = Aggregator::new(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
        let fresh = Entry::new(SourceId::LlmStats, "fresh", 1);
        aggregator.absorb(
            SourceId::LlmStats,
            vec![fresh.clone()],
            vec![
                new_entrant_event(&fresh, &[]),
                vanished_event(&Entry::new(SourceId::LlmStats, "gone", 4)),
            ],
            RefreshStats::default(),
        );
        aggregator.carry_forward(SourceId::Vellum, &[], "timeout");
        let outcome = aggregator.finish();

        let parsed: Value = serde_json::from_str(&render_run_report(&outcome).expect("json"))
            .expect("valid json");
        assert_eq!(parsed["headline_count"], 1);
        assert_eq!(parsed["events"][0]["kind"], "NEW_ENTRANT");
        assert_eq!(parsed["events"][1]["kind"], "VANISHED");
        assert_eq!(parsed["sources"][1]["status"], "carried_forward");
        assert_eq!(parsed["sources"][1]["reason"], "timeout");
    }
}
