//! callsum - Call recording summarizer
//!
//! Batch pipeline turning recorded calls into transcripts and summaries:
//! extract audio → transcribe (splitting oversized files) → summarize.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod backend;
pub mod chunk;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
#[cfg(feature = "cli")]
pub mod diagnostics;
pub mod error;
pub mod media;
#[cfg(feature = "cli")]
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod stage;
pub mod transcript;

// Composition root - needs the HTTP backends and the terminal surface
#[cfg(all(feature = "cli", feature = "openai"))]
pub mod app;

// Collaborator seams
pub use backend::{PromptTemplate, Summarizer, Transcriber};
pub use media::{CommandExecutor, MediaConverter, SystemCommandExecutor};
pub use progress::ProgressReporter;
pub use retry::{RetryPolicy, Sleeper};

// Pipeline
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use stage::{FailurePolicy, Stage, StageOutcome};
pub use transcript::{ChunkTranscript, Segment, Transcript};

// Error handling
pub use error::{CallsumError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.0+abc1234"` when git hash is available, `"0.3.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
