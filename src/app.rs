//! Call summarizer application entry points.
//!
//! Builds the pipeline from configuration and runs the commands of the
//! binary: extract → transcribe → summarize, plus the standalone split and
//! merge tools.

use crate::backend::openai::{ApiClient, OpenAiSummarizer, OpenAiTranscriber};
use crate::backend::{PromptTemplate, Summarizer, Transcriber};
use crate::chunk::{Chunk, ChunkPlan, ScratchDir, split};
use crate::config::Config;
use crate::error::{CallsumError, Result};
use crate::media::{FfmpegConverter, MediaConverter};
use crate::output::{TerminalReporter, print_report};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};
use crate::progress::{LogReporter, ProgressReporter};
use crate::retry::RetryPolicy;
use crate::stage::Stage;
use crate::transcript::{ChunkTranscript, Transcript, merge};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Retry policy from `[pipeline]` settings.
pub fn retry_policy(config: &Config) -> Result<RetryPolicy> {
    Ok(RetryPolicy::new(
        config.pipeline.max_attempts,
        config.pipeline.base_delay()?,
    ))
}

/// Assemble a pipeline able to run `stages`.
///
/// Backends are only built for stages that need them, so extraction alone
/// works without a credential.
pub fn build_pipeline(
    config: &Config,
    stages: &[Stage],
    converter: Arc<dyn MediaConverter>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new(PipelineConfig::from_config(config), converter)
        .with_retry(retry_policy(config)?)
        .with_reporter(reporter);

    let needs_transcriber = stages.contains(&Stage::Transcription);
    let needs_summarizer = stages.contains(&Stage::Summarization);
    if !needs_transcriber && !needs_summarizer {
        return Ok(pipeline);
    }

    let client = ApiClient::from_env(config)?;
    if needs_transcriber {
        let transcriber: Arc<dyn Transcriber> = Arc::new(OpenAiTranscriber::new(
            client.clone(),
            &config.models.transcription,
        ));
        pipeline = pipeline.with_transcriber(transcriber);
    }
    if needs_summarizer {
        let summarizer: Arc<dyn Summarizer> = Arc::new(
            OpenAiSummarizer::new(client, &config.models.summarization)
                .with_sampling(config.backend.max_tokens, config.backend.temperature),
        );
        let prompt = PromptTemplate::new(config.prompt_text()?)?;
        pipeline = pipeline.with_summarizer(summarizer, prompt);
    }
    Ok(pipeline)
}

/// Progress bars on the terminal, or plain log events under `--quiet`.
pub fn progress_reporter(quiet: bool) -> Arc<dyn ProgressReporter> {
    if quiet {
        Arc::new(LogReporter)
    } else {
        Arc::new(TerminalReporter::new())
    }
}

/// Run `stages` with ffmpeg and the HTTP backends, then print the summary.
pub fn run_stages_command(config: &Config, stages: &[Stage], quiet: bool) -> Result<PipelineReport> {
    let converter: Arc<dyn MediaConverter> = Arc::new(FfmpegConverter::system());
    let pipeline = build_pipeline(config, stages, converter, progress_reporter(quiet))?;

    let report = pipeline.run_stages(stages)?;
    if !quiet {
        println!();
        print_report(&report, pipeline.config());
    }
    Ok(report)
}

/// Result of `callsum split`.
#[derive(Debug)]
pub struct SplitResult {
    pub plan: ChunkPlan,
    pub chunks: Vec<Chunk>,
    /// Directory holding the chunk files, `None` when no split was needed.
    pub directory: Option<PathBuf>,
}

/// Plan and cut `file` into chunks no larger than `max_bytes`, keeping them.
pub fn split_file(
    converter: &dyn MediaConverter,
    retry: &RetryPolicy,
    file: &Path,
    out_root: &Path,
    max_bytes: u64,
) -> Result<SplitResult> {
    let size = std::fs::metadata(file)
        .map_err(|_| CallsumError::not_found(file))?
        .len();
    let duration = retry.call(&format!("probe duration of {}", file.display()), || {
        converter.probe_duration(file)
    })?;
    let plan = ChunkPlan::compute(size, max_bytes, duration)?;

    if plan.len() == 1 {
        return Ok(SplitResult {
            plan,
            chunks: Vec::new(),
            directory: None,
        });
    }

    let scratch = ScratchDir::create(out_root, file)?;
    let chunks = split(converter, retry, file, &plan, &scratch, max_bytes)?;
    Ok(SplitResult {
        plan,
        chunks,
        directory: Some(scratch.persist()),
    })
}

/// `callsum split` with the system ffmpeg; prints the plan.
pub fn run_split_command(
    config: &Config,
    file: &Path,
    out: Option<PathBuf>,
    max_bytes: Option<u64>,
) -> Result<()> {
    let converter = FfmpegConverter::system();
    let retry = retry_policy(config)?;
    let out_root = out.unwrap_or_else(|| config.paths.scratch_dir());
    let max_bytes = max_bytes.unwrap_or(config.pipeline.max_upload_bytes);

    let result = split_file(&converter, &retry, file, &out_root, max_bytes)?;
    println!(
        "{}: {:.1}s in {} chunk(s) of at most {} bytes",
        file.display(),
        result.plan.total_duration(),
        result.plan.len(),
        max_bytes
    );
    match &result.directory {
        None => println!("  fits in one upload, nothing to split"),
        Some(dir) => {
            for chunk in &result.chunks {
                println!(
                    "  [{:03}] {:>10.2}s +{:>8.2}s  {}",
                    chunk.index,
                    chunk.start_offset,
                    chunk.duration,
                    chunk.path.display()
                );
            }
            println!("Chunks kept in {}", dir.display());
        }
    }
    Ok(())
}

/// Merge chunk transcripts given in chunk order and write the result.
pub fn merge_files(output: &Path, chunks: &[PathBuf]) -> Result<Transcript> {
    let records = chunks
        .iter()
        .enumerate()
        .map(|(order, path)| Ok(ChunkTranscript::new(order, Transcript::load(path)?)))
        .collect::<Result<Vec<_>>>()?;
    let merged = merge(records)?;
    merged.save(output)?;
    Ok(merged)
}
