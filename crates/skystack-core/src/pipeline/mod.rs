pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{run_stack_job, run_stack_job_reported, JobReport};
pub use types::{NoOpReporter, ProgressReporter, StackStage, StopFlag};
