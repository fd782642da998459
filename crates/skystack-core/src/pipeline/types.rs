use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stacking stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackStage {
    Loading,
    Accumulating,
    Clipping { pass: usize, of: usize },
    Normalizing,
    Writing,
}

impl std::fmt::Display for StackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "Loading reference"),
            Self::Accumulating => write!(f, "Accumulating"),
            Self::Clipping { pass, of } => write!(f, "Sigma clip {pass}/{of}"),
            Self::Normalizing => write!(f, "Normalizing"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for a stacking run.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items
    /// in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: StackStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// Request to stop a stack after the pass in progress completes.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
