//! Chunk planning and splitting of files above the upload limit.

use crate::chunk::scratch::ScratchDir;
use crate::defaults;
use crate::error::{CallsumError, Result};
use crate::media::MediaConverter;
use crate::retry::RetryPolicy;
use std::path::{Path, PathBuf};

/// One planned time window of the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpec {
    pub index: usize,
    /// Seconds from the start of the source.
    pub start_offset: f64,
    pub duration: f64,
}

impl ChunkSpec {
    pub fn end(&self) -> f64 {
        self.start_offset + self.duration
    }
}

/// A materialized chunk file.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub path: PathBuf,
    pub start_offset: f64,
    pub duration: f64,
}

/// Uniform partition of a source's duration.
///
/// The chunk count is `ceil(file_size / size_limit)`, assuming bytes are
/// spread evenly over time (true for the constant-bitrate files extraction
/// produces).
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    specs: Vec<ChunkSpec>,
    total_duration: f64,
}

impl ChunkPlan {
    /// Number of chunks needed so each stays under `size_limit`.
    pub fn chunk_count(file_size: u64, size_limit: u64) -> Result<usize> {
        if size_limit == 0 {
            return Err(CallsumError::Configuration {
                message: "chunk size limit must be positive".to_string(),
            });
        }
        Ok(file_size.div_ceil(size_limit).max(1) as usize)
    }

    /// Plan chunks for a file of `file_size` bytes lasting `total_duration` seconds.
    ///
    /// Falls back to a single whole-file chunk when the per-chunk duration
    /// would be shorter than [`defaults::MIN_CHUNK_SECS`].
    pub fn compute(file_size: u64, size_limit: u64, total_duration: f64) -> Result<Self> {
        if !total_duration.is_finite() || total_duration <= 0.0 {
            return Err(CallsumError::Conversion {
                message: format!("cannot split audio with duration {total_duration}"),
            });
        }

        let mut count = Self::chunk_count(file_size, size_limit)?;
        if total_duration / (count as f64) < defaults::MIN_CHUNK_SECS {
            count = 1;
        }
        let chunk_duration = total_duration / count as f64;

        let specs = (0..count)
            .map(|index| {
                let start_offset = index as f64 * chunk_duration;
                // The last window absorbs rounding so the plan ends exactly at the total.
                let duration = if index + 1 == count {
                    total_duration - start_offset
                } else {
                    chunk_duration
                };
                ChunkSpec {
                    index,
                    start_offset,
                    duration,
                }
            })
            .collect();

        Ok(Self {
            specs,
            total_duration,
        })
    }

    pub fn specs(&self) -> &[ChunkSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }
}

/// Materialize every window of `plan` as a file in `scratch`.
///
/// Each extraction is retried independently. A missing output after a
/// reported success is a conversion error from the converter itself. A chunk
/// larger than `size_limit` fails the split: re-encoding did not shrink the
/// audio enough and the backend would reject the upload.
pub fn split(
    converter: &dyn MediaConverter,
    retry: &RetryPolicy,
    input: &Path,
    plan: &ChunkPlan,
    scratch: &ScratchDir,
    size_limit: u64,
) -> Result<Vec<Chunk>> {
    plan.specs()
        .iter()
        .map(|window| {
            let path = scratch.chunk_path(window.index);
            let operation = format!("extract chunk {} of {}", window.index + 1, input.display());
            retry.call(&operation, || {
                converter.extract_segment(input, &path, window.start_offset, window.duration)
            })?;

            let size = std::fs::metadata(&path)?.len();
            if size > size_limit {
                return Err(CallsumError::Conversion {
                    message: format!(
                        "split produced no size reduction: chunk {} of {} is {size} bytes (limit {size_limit})",
                        window.index + 1,
                        input.display()
                    ),
                });
            }
            Ok(Chunk {
                index: window.index,
                path,
                start_offset: window.start_offset,
                duration: window.duration,
            })
        })
        .collect()
}

/// Split `input` into files no larger than `size_limit`, in chunk order.
///
/// A file within the limit comes back as the only element without any
/// subprocess work. Otherwise the duration is probed once and each chunk is
/// extracted into `scratch`; a plan that degenerates to one chunk also
/// returns the original file. Chunk files belong to the caller's `scratch`
/// guard.
pub fn plan_and_split(
    converter: &dyn MediaConverter,
    retry: &RetryPolicy,
    input: &Path,
    size_limit: u64,
    scratch: &ScratchDir,
) -> Result<Vec<PathBuf>> {
    let file_size = std::fs::metadata(input)
        .map_err(|_| CallsumError::not_found(input))?
        .len();
    if file_size <= size_limit {
        return Ok(vec![input.to_path_buf()]);
    }

    let total_duration = retry.call(&format!("probe {}", input.display()), || {
        converter.probe_duration(input)
    })?;
    let plan = ChunkPlan::compute(file_size, size_limit, total_duration)?;
    if plan.len() == 1 {
        tracing::info!(
            "{} is {file_size} bytes but too short to split, sending whole",
            input.display()
        );
        return Ok(vec![input.to_path_buf()]);
    }

    tracing::info!(
        "splitting {} ({file_size} bytes, {total_duration:.1}s) into {} chunks",
        input.display(),
        plan.len()
    );
    let chunks = split(converter, retry, input, &plan, scratch, size_limit)?;
    Ok(chunks.into_iter().map(|chunk| chunk.path).collect())
}
