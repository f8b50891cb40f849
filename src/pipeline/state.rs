use std::fmt;

/// Where a pipeline run currently is. `Committed` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineState {
    NotStarted,
    Reading,
    Normalizing,
    WritingProcessed,
    /// Writing aggregate `n` (1-based, in write order).
    WritingAggregate(usize),
    Committed,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &str {
        match self {
            PipelineState::NotStarted => "NOT_STARTED",
            PipelineState::Reading => "READING",
            PipelineState::Normalizing => "NORMALIZING",
            PipelineState::WritingProcessed => "WRITING_PROCESSED",
            PipelineState::WritingAggregate(1) => "WRITING_AGG_1",
            PipelineState::WritingAggregate(2) => "WRITING_AGG_2",
            PipelineState::WritingAggregate(3) => "WRITING_AGG_3",
            PipelineState::WritingAggregate(4) => "WRITING_AGG_4",
            PipelineState::WritingAggregate(_) => "WRITING_AGG",
            PipelineState::Committed => "COMMITTED",
            PipelineState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Committed | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
