//! The extract → transcribe → summarize pipeline.

pub mod orchestrator;

pub use orchestrator::{Pipeline, PipelineConfig, PipelineReport};
