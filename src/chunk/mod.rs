//! Splitting audio above the transcription upload limit.

pub mod plan;
pub mod scratch;

pub use plan::{Chunk, ChunkPlan, ChunkSpec, plan_and_split, split};
pub use scratch::{ScratchDir, remove_root_if_empty, unique_prefix};
