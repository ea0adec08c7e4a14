//! The three pipeline stage jobs.

use crate::backend::{PromptTemplate, Summarizer, Transcriber};
use crate::chunk::{ScratchDir, plan_and_split};
use crate::defaults;
use crate::error::Result;
use crate::media::{MediaConverter, MediaFile};
use crate::progress::ProgressReporter;
use crate::retry::RetryPolicy;
use crate::stage::Stage;
use crate::stage::pool::{FailurePolicy, parallel_map};
use crate::stage::runner::StageJob;
use crate::transcript::{self, ChunkTranscript, Transcript};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Video → mono 16 kHz WAV.
pub struct ExtractJob<'a> {
    converter: &'a dyn MediaConverter,
    retry: &'a RetryPolicy,
    audio_dir: PathBuf,
}

impl<'a> ExtractJob<'a> {
    pub fn new(converter: &'a dyn MediaConverter, retry: &'a RetryPolicy, audio_dir: &Path) -> Self {
        Self {
            converter,
            retry,
            audio_dir: audio_dir.to_path_buf(),
        }
    }
}

impl StageJob for ExtractJob<'_> {
    fn stage(&self) -> Stage {
        Stage::Extraction
    }

    fn output_path(&self, input: &MediaFile) -> PathBuf {
        input.output_in(&self.audio_dir, defaults::EXTRACTED_AUDIO_EXTENSION)
    }

    fn process(&self, input: &MediaFile, output: &Path) -> Result<()> {
        self.retry
            .call(&format!("extract audio from {}", input.name()), || {
                self.converter.extract_audio(input.path(), output)
            })
    }
}

/// Audio → transcript JSON, splitting files above the upload limit.
pub struct TranscribeJob<'a> {
    transcriber: &'a dyn Transcriber,
    converter: &'a dyn MediaConverter,
    retry: &'a RetryPolicy,
    reporter: &'a dyn ProgressReporter,
    transcripts_dir: PathBuf,
    scratch_root: PathBuf,
    max_upload_bytes: u64,
    chunk_concurrency: usize,
}

impl<'a> TranscribeJob<'a> {
    pub fn new(
        transcriber: &'a dyn Transcriber,
        converter: &'a dyn MediaConverter,
        retry: &'a RetryPolicy,
        reporter: &'a dyn ProgressReporter,
        transcripts_dir: &Path,
    ) -> Self {
        Self {
            transcriber,
            converter,
            retry,
            reporter,
            transcripts_dir: transcripts_dir.to_path_buf(),
            scratch_root: transcripts_dir.join(defaults::SCRATCH_DIR_NAME),
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            chunk_concurrency: defaults::CHUNK_CONCURRENCY,
        }
    }

    pub fn with_upload_limit(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_chunk_concurrency(mut self, workers: usize) -> Self {
        self.chunk_concurrency = workers.max(1);
        self
    }

    pub fn with_scratch_root(mut self, dir: &Path) -> Self {
        self.scratch_root = dir.to_path_buf();
        self
    }

    fn transcribe_direct(&self, input: &MediaFile, output: &Path) -> Result<()> {
        let transcript = self
            .retry
            .call(&format!("transcribe {}", input.name()), || {
                self.transcriber.transcribe(input.path())
            })?;
        transcript.save(output)
    }

    /// Split, transcribe chunks in parallel, merge.
    ///
    /// The scratch guard removes every chunk file on return, including
    /// early returns through `?`.
    fn transcribe_chunked(&self, input: &MediaFile, output: &Path) -> Result<()> {
        let scratch = ScratchDir::create(&self.scratch_root, input.path())?;
        let chunks = plan_and_split(
            self.converter,
            self.retry,
            input.path(),
            self.max_upload_bytes,
            &scratch,
        )?;
        if chunks.len() == 1 {
            return self.transcribe_direct(input, output);
        }

        let name = input.name();
        let total = chunks.len();
        let done = AtomicUsize::new(0);
        self.reporter.chunk_progress(&name, 0, total);

        let results = parallel_map(
            chunks,
            self.chunk_concurrency,
            FailurePolicy::FailFast,
            |index, chunk_path| {
                let operation = format!("transcribe chunk {}/{total} of {name}", index + 1);
                let transcript = self
                    .retry
                    .call(&operation, || self.transcriber.transcribe(&chunk_path))?;

                let temp = scratch.transcript_path(index);
                transcript.save(&temp)?;
                let transcript = Transcript::load(&temp)?;
                std::fs::remove_file(&temp)?;

                let completed = done.fetch_add(1, Ordering::SeqCst) + 1;
                self.reporter.chunk_progress(&name, completed, total);
                Ok(ChunkTranscript::new(index, transcript))
            },
        );

        // Completion order; the merger re-sorts by chunk order.
        let records = results
            .completed
            .into_iter()
            .map(|(_, result)| result)
            .collect::<Result<Vec<_>>>()?;

        let merged = transcript::merge(records)?;
        tracing::info!(
            "{name}: merged {total} chunks ({:.1}s, {} segments)",
            merged.duration,
            merged.segments.len()
        );
        merged.save(output)
    }
}

impl StageJob for TranscribeJob<'_> {
    fn stage(&self) -> Stage {
        Stage::Transcription
    }

    fn output_path(&self, input: &MediaFile) -> PathBuf {
        input.output_in(&self.transcripts_dir, defaults::TRANSCRIPT_EXTENSION)
    }

    fn process(&self, input: &MediaFile, output: &Path) -> Result<()> {
        if input.size()? <= self.max_upload_bytes {
            self.transcribe_direct(input, output)
        } else {
            self.transcribe_chunked(input, output)
        }
    }
}

/// Transcript JSON → plain-text summary.
pub struct SummarizeJob<'a> {
    summarizer: &'a dyn Summarizer,
    retry: &'a RetryPolicy,
    prompt: PromptTemplate,
    summaries_dir: PathBuf,
}

impl<'a> SummarizeJob<'a> {
    pub fn new(
        summarizer: &'a dyn Summarizer,
        retry: &'a RetryPolicy,
        prompt: PromptTemplate,
        summaries_dir: &Path,
    ) -> Self {
        Self {
            summarizer,
            retry,
            prompt,
            summaries_dir: summaries_dir.to_path_buf(),
        }
    }
}

impl StageJob for SummarizeJob<'_> {
    fn stage(&self) -> Stage {
        Stage::Summarization
    }

    fn output_path(&self, input: &MediaFile) -> PathBuf {
        input.output_in(&self.summaries_dir, defaults::SUMMARY_EXTENSION)
    }

    fn process(&self, input: &MediaFile, output: &Path) -> Result<()> {
        let transcript = Transcript::load(input.path())?;
        let summary = self
            .retry
            .call(&format!("summarize {}", input.name()), || {
                self.summarizer.summarize(&self.prompt, &transcript.text)
            })?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, summary)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockSummarizer, MockTranscriber};
    use crate::error::CallsumError;
    use crate::media::converter::ConverterCall;
    use crate::media::{MediaKind, MockConverter};
    use crate::progress::NoopReporter;
    use crate::retry::RecordingSleeper;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    fn retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(1)).with_sleeper(Arc::new(RecordingSleeper::new()))
    }

    fn audio(dir: &Path, name: &str, len: u64) -> MediaFile {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().set_len(len).unwrap();
        MediaFile::new(&path, MediaKind::Audio).unwrap()
    }

    /// No chunk directory left behind under the shared scratch root.
    fn scratch_is_empty(transcripts: &Path) -> bool {
        match std::fs::read_dir(transcripts.join(defaults::SCRATCH_DIR_NAME)) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    #[derive(Default)]
    struct ChunkEvents(Mutex<Vec<(usize, usize)>>);

    impl ProgressReporter for ChunkEvents {
        fn chunk_progress(&self, _name: &str, completed: usize, total: usize) {
            self.0.lock().unwrap().push((completed, total));
        }
    }

    #[test]
    fn test_extract_job_output_and_call() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Team Call.MP4");
        std::fs::write(&video, b"v").unwrap();
        let video = MediaFile::new(&video, MediaKind::Video).unwrap();
        let converter = MockConverter::new(60.0).with_failures(1);
        let retry = retry();
        let job = ExtractJob::new(&converter, &retry, &dir.path().join("audio"));

        let output = job.output_path(&video);
        assert_eq!(output, dir.path().join("audio").join("Team Call.wav"));
        job.process(&video, &output).unwrap();

        assert!(output.exists());
        assert_eq!(converter.call_count(), 2);
    }

    #[test]
    fn test_small_file_is_transcribed_directly() {
        let dir = tempfile::tempdir().unwrap();
        let input = audio(dir.path(), "call.wav", 1024);
        let transcriber = MockTranscriber::new("whisper-1");
        let converter = MockConverter::new(60.0);
        let retry = retry();
        let job = TranscribeJob::new(
            &transcriber,
            &converter,
            &retry,
            &NoopReporter,
            &dir.path().join("transcripts"),
        );

        let output = job.output_path(&input);
        job.process(&input, &output).unwrap();

        assert_eq!(converter.call_count(), 0);
        assert_eq!(transcriber.calls(), vec![input.path().to_path_buf()]);
        assert_eq!(Transcript::load(&output).unwrap().segments.len(), 1);
    }

    #[test]
    fn test_large_file_is_chunked_merged_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = dir.path().join("transcripts");
        let input = audio(dir.path(), "long.wav", 40 * MIB);
        let transcriber = MockTranscriber::new("whisper-1").with_duration(1200.0);
        let converter = MockConverter::new(2400.0);
        let retry = retry();
        let events = ChunkEvents::default();
        let job = TranscribeJob::new(&transcriber, &converter, &retry, &events, &transcripts)
            .with_upload_limit(25 * MIB)
            .with_chunk_concurrency(2);

        let output = job.output_path(&input);
        job.process(&input, &output).unwrap();

        let merged = Transcript::load(&output).unwrap();
        assert!((merged.duration - 2400.0).abs() < 1e-6);
        assert_eq!(merged.segments.len(), 2);
        assert_eq!(merged.segments[1].start, 1200.0);
        assert_eq!(merged.segments[1].id, 1);

        assert_eq!(transcriber.call_count(), 2);
        assert!(transcriber.calls().iter().all(|p| p != input.path()));
        assert!(scratch_is_empty(&transcripts));

        let events = events.0.lock().unwrap().clone();
        assert_eq!(events.first(), Some(&(0, 2)));
        assert!(events.contains(&(2, 2)));
    }

    #[test]
    fn test_chunk_failure_still_cleans_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = dir.path().join("transcripts");
        let input = audio(dir.path(), "long.wav", 40 * MIB);
        let transcriber = MockTranscriber::new("whisper-1").failing_on("_001");
        let converter = MockConverter::new(2400.0);
        let retry = retry();
        let job = TranscribeJob::new(&transcriber, &converter, &retry, &NoopReporter, &transcripts)
            .with_upload_limit(25 * MIB);

        let output = job.output_path(&input);
        let err = job.process(&input, &output).unwrap_err();

        assert!(matches!(err, CallsumError::RetryExhausted { attempts: 3, .. }));
        assert!(!output.exists());
        assert!(scratch_is_empty(&transcripts));
    }

    #[test]
    fn test_too_short_to_split_falls_back_to_direct() {
        let dir = tempfile::tempdir().unwrap();
        let transcripts = dir.path().join("transcripts");
        let input = audio(dir.path(), "dense.wav", 40 * MIB);
        let transcriber = MockTranscriber::new("whisper-1");
        // 0.5 s split in two is below the minimum chunk length.
        let converter = MockConverter::new(0.5);
        let retry = retry();
        let job = TranscribeJob::new(&transcriber, &converter, &retry, &NoopReporter, &transcripts)
            .with_upload_limit(25 * MIB);

        let output = job.output_path(&input);
        job.process(&input, &output).unwrap();

        assert_eq!(transcriber.calls(), vec![input.path().to_path_buf()]);
        assert_eq!(converter.calls().len(), 1);
        assert!(matches!(converter.calls()[0], ConverterCall::Probe(_)));
        assert!(scratch_is_empty(&transcripts));
    }

    #[test]
    fn test_summarize_job_renders_transcript_text() {
        let dir = tempfile::tempdir().unwrap();
        let transcript_path = dir.path().join("call.json");
        Transcript {
            text: "we agreed on 10k".to_string(),
            language: "english".to_string(),
            duration: 3.0,
            segments: Vec::new(),
        }
        .save(&transcript_path)
        .unwrap();
        let input = MediaFile::new(&transcript_path, MediaKind::Transcript).unwrap();

        let summarizer = MockSummarizer::new("gpt-4o-mini").with_response("Pricing: 10k");
        let retry = retry();
        let prompt = PromptTemplate::new("Summarize:\n{transcript_text}").unwrap();
        let job = SummarizeJob::new(&summarizer, &retry, prompt, &dir.path().join("summaries"));

        let output = job.output_path(&input);
        assert_eq!(output, dir.path().join("summaries").join("call.txt"));
        job.process(&input, &output).unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "Pricing: 10k");
        assert_eq!(summarizer.prompts(), vec!["Summarize:\nwe agreed on 10k".to_string()]);
    }

    #[test]
    fn test_summarize_job_rejects_invalid_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();
        let input = MediaFile::new(&path, MediaKind::Transcript).unwrap();
        let summarizer = MockSummarizer::new("m");
        let retry = retry();
        let job = SummarizeJob::new(&summarizer, &retry, PromptTemplate::default(), dir.path());

        let output = job.output_path(&input);
        assert!(job.process(&input, &output).is_err());
        assert_eq!(summarizer.call_count(), 0);
    }
}
