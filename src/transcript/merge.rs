//! Reassembly of per-chunk transcripts into one transcript.
//!
//! Chunks can finish in any order, so records are sorted by `chunk_order`
//! before anything else happens. Each chunk's segments are shifted by the
//! summed durations of the chunks before it; the chunk's reported duration is
//! the advance, not its last segment end, so trailing silence is accounted for.

use crate::error::{CallsumError, Result};
use crate::transcript::{ChunkTranscript, Segment, Transcript};

/// Merge chunk transcripts into one continuous transcript.
///
/// An empty input means an upstream invariant broke and is a `Merge` error.
/// A single record is returned unchanged.
pub fn merge(mut records: Vec<ChunkTranscript>) -> Result<Transcript> {
    if records.len() <= 1 {
        return records
            .pop()
            .map(|record| record.transcript)
            .ok_or_else(|| CallsumError::Merge {
                message: "no chunk transcripts to merge".to_string(),
            });
    }

    records.sort_by_key(|record| record.chunk_order);

    let text = records
        .iter()
        .map(|record| record.transcript.text.as_str())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut segments: Vec<Segment> = Vec::new();
    let mut time_offset = 0.0;
    for record in &records {
        for segment in &record.transcript.segments {
            segments.push(Segment {
                id: segments.len(),
                start: segment.start + time_offset,
                end: segment.end + time_offset,
                text: segment.text.clone(),
            });
        }
        time_offset += record.transcript.duration;
    }

    Ok(Transcript {
        text,
        language: records[0].transcript.language.clone(),
        duration: time_offset,
        segments,
    })
}
