//! Generic stage execution: skip check, bounded fan-out, outcome counting.

use crate::error::Result;
use crate::media::MediaFile;
use crate::progress::{ProgressReporter, TaskStatus};
use crate::stage::Stage;
use crate::stage::pool::{FailurePolicy, parallel_map};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Aggregate counts for one stage run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageOutcome {
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

impl StageOutcome {
    /// `successful / total * 100`, or 0 for an empty stage.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64 * 100.0
        }
    }
}

/// Per-item work of one stage.
pub trait StageJob: Sync {
    fn stage(&self) -> Stage;

    /// Canonical output for `input`; its existence marks the item done.
    fn output_path(&self, input: &MediaFile) -> PathBuf;

    /// Produce `output` from `input`.
    fn process(&self, input: &MediaFile, output: &Path) -> Result<()>;
}

/// Settings shared by every stage run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub concurrency: usize,
    pub policy: FailurePolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: crate::defaults::CONCURRENCY,
            policy: FailurePolicy::FailFast,
        }
    }
}

/// Run `job` over `items`.
///
/// Items whose output already exists are counted as skipped without calling
/// `process`, as are inputs whose output another input already claims. The rest go through [`parallel_map`]. A failed item never
/// leaves a partial output at its canonical path.
///
/// Under `FailFast` the first failure is returned once in-flight items have
/// finished. Under `KeepGoing` failures are counted and logged.
pub fn run_stage(
    job: &dyn StageJob,
    items: Vec<MediaFile>,
    options: RunOptions,
    reporter: &dyn ProgressReporter,
) -> Result<StageOutcome> {
    let stage = job.stage();
    let mut outcome = StageOutcome {
        total: items.len(),
        ..StageOutcome::default()
    };
    reporter.stage_started(stage, items.len());

    let mut pending = Vec::new();
    let mut claimed = HashSet::new();
    for item in items {
        let output = job.output_path(&item);
        if !claimed.insert(output.clone()) {
            // `call.mp4` and `call.mov` both map to `call.wav`; the first in scan order wins.
            tracing::warn!(
                "{}: skipping {}, {} is already produced by another input",
                stage.label(),
                item.path().display(),
                output.display()
            );
            outcome.skipped += 1;
            reporter.task_finished(
                stage,
                &item.name(),
                TaskStatus::Skipped,
                &format!("duplicate output {}", output.display()),
            );
        } else if output.exists() {
            outcome.skipped += 1;
            reporter.task_finished(
                stage,
                &item.name(),
                TaskStatus::Skipped,
                &format!("{} already exists", output.display()),
            );
        } else {
            pending.push((item, output));
        }
    }

    let results = parallel_map(pending, options.concurrency, options.policy, |_, (item, output)| {
        let name = item.name();
        reporter.task_started(stage, &name);

        match job.process(&item, &output) {
            Ok(()) => {
                reporter.task_finished(
                    stage,
                    &name,
                    TaskStatus::Completed,
                    &output.display().to_string(),
                );
                Ok(())
            }
            Err(e) => {
                discard_partial(&output);
                reporter.task_finished(stage, &name, TaskStatus::Failed, &e.to_string());
                Err(e)
            }
        }
    });

    let mut first_error = None;
    for (_, result) in results.completed {
        match result {
            Ok(()) => outcome.successful += 1,
            Err(e) => {
                outcome.failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    tracing::error!("{}: {e}", stage.label());
                }
            }
        }
    }

    reporter.stage_finished(stage, &outcome);

    match (first_error, options.policy) {
        (Some(e), FailurePolicy::FailFast) => {
            if results.not_started > 0 {
                tracing::warn!(
                    "{}: stopped with {} file(s) not started",
                    stage.label(),
                    results.not_started
                );
            }
            Err(e)
        }
        (Some(e), FailurePolicy::KeepGoing) => {
            tracing::error!("{}: {e}", stage.label());
            Ok(outcome)
        }
        (None, _) => Ok(outcome),
    }
}

fn discard_partial(output: &Path) {
    if output.exists()
        && let Err(e) = std::fs::remove_file(output)
    {
        tracing::warn!("failed to remove partial output {}: {e}", output.display());
    }
}
