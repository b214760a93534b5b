pub mod aggregator;
pub mod classifier;
pub mod event;
pub mod matcher;
pub mod thresholds;

pub use aggregator::{order_events, Aggregator, RefreshStats, RunOutcome, SourceStatus};
pub use classifier::{classify_pair, new_entrant_event, vanished_event, PairDefect};
pub use event::{ChangeEvent, ChangeKind, Observation};
pub use matcher::{match_entries, MatchedPair, SourceMatch};
pub use thresholds::{ThresholdTable, Thresholds};
