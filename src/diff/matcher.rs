use std::collections::BTreeMap;

use tracing::warn;

use crate::leaderboard::{Entry, SourceId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedPair<'a> {
    pub previous: &'a Entry,
    pub current: &'a Entry,
}

/// Partition of one source's entries across two runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMatch<'a> {
    pub source: SourceId,
    pub matched: Vec<MatchedPair<'a>>,
    pub new: Vec<&'a Entry>,
    pub vanished: Vec<&'a Entry>,
}

/// Pairs baseline and current entries of one source by exact model name.
///
/// Matching never crosses sources: entries tagged with another source are
/// ignored. `matched` and `new` follow the current list's order, `vanished`
/// follows the baseline's.
pub fn match_entries<'a>(
    source: SourceId,
    previous: &'a [Entry],
    current: &'a [Entry],
) -> SourceMatch<'a> {
    let previous: Vec<&Entry> = own_entries(source, previous).collect();
    let current: Vec<&Entry> = own_entries(source, current).collect();
    let previous_by_model: BTreeMap<&str, &Entry> =
        previous.iter().map(|&e| (e.model.as_str(), e)).collect();
    let current_by_model: BTreeMap<&str, &Entry> =
        current.iter().map(|&e| (e.model.as_str(), e)).collect();

    let mut matched = Vec::new();
    let mut new = Vec::new();
    for entry in current {
        match previous_by_model.get(entry.model.as_str()) {
            Some(prev) => matched.push(MatchedPair {
                previous: *prev,
                current: entry,
            }),
            None => new.push(entry),
        }
    }

    let vanished = previous
        .into_iter()
        .filter(|e| !current_by_model.contains_key(e.model.as_str()))
        .collect();

    SourceMatch {
        source,
        matched,
        new,
        vanished,
    }
}

fn own_entries(source: SourceId, entries: &[Entry]) -> impl Iterator<Item = &Entry> {
    entries.iter().filter(move |e| {
        if e.source != source {
            warn!(
                "ignoring {} entry {} while matching {}",
                e.source.as_slug(),
                e.model,
                source.as_slug()
            );
            return false;
        }
        true
    })
}
