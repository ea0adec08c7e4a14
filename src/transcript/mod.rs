//! Transcript data model and its on-disk JSON form.
//!
//! The JSON shape matches a verbose speech-to-text response (`text`,
//! `language`, `duration`, `segments[]`), so a merged transcript looks exactly
//! like a direct one.

pub mod merge;

pub use merge::merge;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A timestamped phrase within a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: usize,
    /// Seconds from the start of the audio.
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A complete transcription of one audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default)]
    pub language: String,
    /// Total audio duration in seconds.
    pub duration: f64,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// A chunk's transcript tagged with the chunk's position in the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTranscript {
    pub chunk_order: usize,
    pub transcript: Transcript,
}

impl ChunkTranscript {
    pub fn new(chunk_order: usize, transcript: Transcript) -> Self {
        Self {
            chunk_order,
            transcript,
        }
    }
}

impl Transcript {
    /// Read a transcript JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write as pretty-printed JSON with fixed key order.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        std::fs::write(path, json)?;
        Ok(())
    }
}
