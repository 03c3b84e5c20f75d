pub mod model;
pub mod orchestrator;
pub mod partition;
pub mod progress;
pub mod repository;
pub mod repository_sqlx;
pub mod tracker;

pub use model::{BatchCheckpoint, BatchRun, RetryPolicy, RunRequest, RunState};
pub use orchestrator::{BatchOrchestrator, RunSummary, TriggerOutcome};
pub use partition::{Interval, IntervalPlan};
