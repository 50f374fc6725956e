pub mod alert_run;
pub mod engine;
pub mod evaluator;

pub use alert_run::{reset_occurrences, run_alerts, RunOptions, RunSummary};
pub use engine::RulesEngine;
