pub mod history;
pub mod migrations;
pub mod store;

pub use history::{history_cutoff, summarize_model_history, RecordedEvent};
pub use store::SnapshotStore;
