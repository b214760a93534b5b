pub mod config;
pub mod diff;
pub mod leaderboard;
pub mod output;
pub mod pipeline;
pub mod snapshot;

pub use pipeline::run_pass;
