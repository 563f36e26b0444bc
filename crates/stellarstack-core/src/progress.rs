/// Stacking run stage, used for progress reporting.
#[derive(Clone, Copy, Debug)]
pub enum StackStage {
    Selecting,
    Normalizing,
    Planning,
    Stacking,
    Writing,
}

impl std::fmt::Display for StackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Selecting => write!(f, "Selecting frames"),
            Self::Normalizing => write!(f, "Computing normalization"),
            Self::Planning => write!(f, "Planning chunks"),
            Self::Stacking => write!(f, "Stacking"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for a stacking run.
///
/// Implementors can drive progress bars, logging, or any other UI feedback.
/// All methods have default no-op implementations. During the stacking stage
/// `advance` fires at least once per chunk.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of work items in
    /// this stage (e.g., chunk count), if known.
    fn begin_stage(&self, _stage: StackStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
