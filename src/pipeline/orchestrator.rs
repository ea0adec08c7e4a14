//! Sequencing of the three stages over the data directory.
//!
//! Each stage rescans its input directory, so whatever the previous stage
//! left on disk is the next stage's work list. Output presence is the only
//! completion record.

use crate::backend::{PromptTemplate, Summarizer, Transcriber};
use crate::chunk::remove_root_if_empty;
use crate::config::Config;
use crate::error::{CallsumError, Result};
use crate::media::{MediaConverter, MediaFile, MediaKind, scan};
use crate::progress::{NoopReporter, ProgressReporter};
use crate::retry::RetryPolicy;
use crate::stage::{
    ExtractJob, FailurePolicy, RunOptions, Stage, StageJob, StageOutcome, SummarizeJob,
    TranscribeJob, run_stage,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directories and limits for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub videos_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub transcripts_dir: PathBuf,
    pub summaries_dir: PathBuf,
    /// Shared root for per-file chunk directories.
    pub scratch_dir: PathBuf,
    /// Only the first N files of each stage (sorted by path).
    pub limit: Option<usize>,
    pub concurrency: usize,
    pub chunk_concurrency: usize,
    pub max_upload_bytes: u64,
    pub failure_policy: FailurePolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let pipeline = &config.pipeline;
        Self {
            videos_dir: config.paths.videos_dir(),
            audio_dir: config.paths.audio_dir(),
            transcripts_dir: config.paths.transcripts_dir(),
            summaries_dir: config.paths.summaries_dir(),
            scratch_dir: config.paths.scratch_dir(),
            limit: pipeline.limit,
            concurrency: pipeline.concurrency,
            chunk_concurrency: pipeline.chunk_concurrency,
            max_upload_bytes: pipeline.max_upload_bytes,
            failure_policy: if pipeline.keep_going {
                FailurePolicy::KeepGoing
            } else {
                FailurePolicy::FailFast
            },
        }
    }

    /// Input directory and file kind scanned by `stage`.
    pub fn input_of(&self, stage: Stage) -> (&Path, MediaKind) {
        match stage {
            Stage::Extraction => (&self.videos_dir, MediaKind::Video),
            Stage::Transcription => (&self.audio_dir, MediaKind::Audio),
            Stage::Summarization => (&self.transcripts_dir, MediaKind::Transcript),
        }
    }

    pub fn output_of(&self, stage: Stage) -> &Path {
        match stage {
            Stage::Extraction => &self.audio_dir,
            Stage::Transcription => &self.transcripts_dir,
            Stage::Summarization => &self.summaries_dir,
        }
    }
}

/// Per-stage outcomes of a run, in execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub stages: Vec<(Stage, StageOutcome)>,
}

impl PipelineReport {
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| outcome)
    }

    pub fn total_successful(&self) -> usize {
        self.stages.iter().map(|(_, o)| o.successful).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.stages.iter().map(|(_, o)| o.failed).sum()
    }

    pub fn total_items(&self) -> usize {
        self.stages.iter().map(|(_, o)| o.total).sum()
    }

    /// `Σ successful / Σ total * 100` across stages, 0 when nothing ran.
    pub fn overall_success_rate(&self) -> f64 {
        let total = self.total_items();
        if total == 0 {
            0.0
        } else {
            self.total_successful() as f64 / total as f64 * 100.0
        }
    }
}

/// Runs stages against injected collaborators.
///
/// Backends are optional so that extraction alone needs no credential.
pub struct Pipeline {
    config: PipelineConfig,
    converter: Arc<dyn MediaConverter>,
    transcriber: Option<Arc<dyn Transcriber>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    prompt: PromptTemplate,
    retry: RetryPolicy,
    reporter: Arc<dyn ProgressReporter>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, converter: Arc<dyn MediaConverter>) -> Self {
        Self {
            config,
            converter,
            transcriber: None,
            summarizer: None,
            prompt: PromptTemplate::default(),
            retry: RetryPolicy::default(),
            reporter: Arc::new(NoopReporter),
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>, prompt: PromptTemplate) -> Self {
        self.summarizer = Some(summarizer);
        self.prompt = prompt;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extraction, transcription and summarization in order.
    pub fn run(&self) -> Result<PipelineReport> {
        self.run_stages(&Stage::ALL)
    }

    /// Run `stages` in the given order, stopping at the first stage error.
    pub fn run_stages(&self, stages: &[Stage]) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        for &stage in stages {
            let outcome = self.run_one(stage)?;
            report.stages.push((stage, outcome));
        }
        Ok(report)
    }

    /// Scan the stage's input directory and run the stage over it.
    pub fn run_one(&self, stage: Stage) -> Result<StageOutcome> {
        let (input_dir, kind) = self.config.input_of(stage);
        let items = scan(input_dir, kind, self.config.limit)?;
        std::fs::create_dir_all(self.config.output_of(stage))?;
        tracing::info!(
            "{stage}: {} file(s) in {}",
            items.len(),
            input_dir.display()
        );

        let options = RunOptions {
            concurrency: self.config.concurrency,
            policy: self.config.failure_policy,
        };
        let reporter = &*self.reporter;

        match stage {
            Stage::Extraction => {
                let job = ExtractJob::new(&*self.converter, &self.retry, &self.config.audio_dir);
                self.execute(&job, items, options)
            }
            Stage::Transcription => {
                let transcriber = self.transcriber.as_deref().ok_or_else(|| missing_backend(stage))?;
                let job = TranscribeJob::new(
                    transcriber,
                    &*self.converter,
                    &self.retry,
                    reporter,
                    &self.config.transcripts_dir,
                )
                .with_scratch_root(&self.config.scratch_dir)
                .with_upload_limit(self.config.max_upload_bytes)
                .with_chunk_concurrency(self.config.chunk_concurrency);
                let outcome = self.execute(&job, items, options);
                remove_root_if_empty(&self.config.scratch_dir);
                outcome
            }
            Stage::Summarization => {
                let summarizer = self.summarizer.as_deref().ok_or_else(|| missing_backend(stage))?;
                let job = SummarizeJob::new(
                    summarizer,
                    &self.retry,
                    self.prompt.clone(),
                    &self.config.summaries_dir,
                );
                self.execute(&job, items, options)
            }
        }
    }

    fn execute(
        &self,
        job: &dyn StageJob,
        items: Vec<MediaFile>,
        options: RunOptions,
    ) -> Result<StageOutcome> {
        run_stage(job, items, options, &*self.reporter)
    }
}

fn missing_backend(stage: Stage) -> CallsumError {
    CallsumError::Configuration {
        message: format!("no backend configured for {stage}"),
    }
}
