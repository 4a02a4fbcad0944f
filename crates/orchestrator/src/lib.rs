pub mod orchestrator;
pub mod plan;
pub mod tracker;

pub use orchestrator::{ExecutionOutcome, ExecutionStatus, Orchestrator};
pub use tracker::{Counters, ProgressEvent, ProgressStatus, ProgressTracker};
