//! Stage execution: bounded worker pool, skip-if-done runner and the three
//! stage jobs.

pub mod jobs;
pub mod pool;
pub mod runner;

pub use jobs::{ExtractJob, SummarizeJob, TranscribeJob};
pub use pool::{FailurePolicy, PoolResults, parallel_map};
pub use runner::{RunOptions, StageJob, StageOutcome, run_stage};

/// One of the three pipeline phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extraction,
    Transcription,
    Summarization,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Extraction, Stage::Transcription, Stage::Summarization];

    pub fn label(self) -> &'static str {
        match self {
            Stage::Extraction => "Audio extraction",
            Stage::Transcription => "Transcription",
            Stage::Summarization => "Summarization",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
