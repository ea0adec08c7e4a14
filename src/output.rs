//! Terminal rendering: live progress bars and the final run summary.
//! Used by every pipeline command of the binary.

use crate::pipeline::{PipelineConfig, PipelineReport};
use crate::progress::{ProgressReporter, TaskStatus};
use crate::stage::{Stage, StageOutcome};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::sync::Mutex;

const STAGE_TEMPLATE: &str = "{prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}";
const CHUNK_TEMPLATE: &str = "  {spinner:.green} {prefix} [{bar:20.green/white}] {pos}/{len} chunks";

fn style(template: &str) -> ProgressStyle {
    // Falls back to the plain bar if a template fails to parse.
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Progress reporter drawing one bar per stage and one per chunked file.
///
/// Failure messages are printed above the bars so they stay visible after
/// the bars are cleared.
pub struct TerminalReporter {
    multi: MultiProgress,
    stage_bar: Mutex<Option<ProgressBar>>,
    chunk_bars: Mutex<HashMap<String, ProgressBar>>,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Reporter that tracks state but never draws (`--quiet`).
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            stage_bar: Mutex::new(None),
            chunk_bars: Mutex::new(HashMap::new()),
        }
    }

    fn current_bar(&self) -> Option<ProgressBar> {
        self.stage_bar.lock().ok().and_then(|bar| bar.clone())
    }

    fn println(&self, line: String) {
        if let Err(e) = self.multi.println(line) {
            tracing::debug!("progress output failed: {e}");
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TerminalReporter {
    fn stage_started(&self, stage: Stage, total: usize) {
        let bar = self.multi.add(ProgressBar::new(total as u64));
        bar.set_style(style(STAGE_TEMPLATE));
        bar.set_prefix(stage.label());
        if let Ok(mut slot) = self.stage_bar.lock() {
            *slot = Some(bar);
        }
    }

    fn task_started(&self, _stage: Stage, name: &str) {
        if let Some(bar) = self.current_bar() {
            bar.set_message(name.to_string());
        }
    }

    fn chunk_progress(&self, name: &str, completed: usize, total: usize) {
        let Ok(mut bars) = self.chunk_bars.lock() else {
            return;
        };
        let bar = bars.entry(name.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(total as u64));
            bar.set_style(style(CHUNK_TEMPLATE));
            bar.set_prefix(name.to_string());
            bar
        });
        bar.set_length(total as u64);
        bar.set_position(completed as u64);
    }

    fn task_finished(&self, stage: Stage, name: &str, status: TaskStatus, message: &str) {
        if let Ok(mut bars) = self.chunk_bars.lock()
            && let Some(bar) = bars.remove(name)
        {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }

        if status == TaskStatus::Failed {
            self.println(format!("{} {}: {name}: {message}", "✗".red(), stage.label()));
        }

        if let Some(bar) = self.current_bar() {
            bar.inc(1);
        }
    }

    fn stage_finished(&self, stage: Stage, outcome: &StageOutcome) {
        let bar = self.stage_bar.lock().ok().and_then(|mut slot| slot.take());
        if let Some(bar) = bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        let mark = if outcome.failed > 0 {
            "!".yellow().to_string()
        } else {
            "✓".green().to_string()
        };
        self.println(format!(
            "{mark} {}: {} done, {} skipped, {} failed",
            stage.label(),
            outcome.successful,
            outcome.skipped,
            outcome.failed
        ));
    }
}

/// Render the end-of-run table: per-stage counts, overall success rate and
/// where the outputs went.
pub fn render_report(report: &PipelineReport, config: &PipelineConfig, color: bool) -> String {
    let paint = |text: String, f: fn(&str) -> String| if color { f(&text) } else { text };

    let mut lines = vec![
        paint("Pipeline summary".to_string(), |s| s.bold().to_string()),
        format!(
            "  {:<18} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "Stage", "Total", "Done", "Skipped", "Failed", "Rate"
        ),
    ];
    for (stage, outcome) in &report.stages {
        let failed = format!("{:>8}", outcome.failed);
        let failed = if outcome.failed > 0 {
            paint(failed, |s| s.red().to_string())
        } else {
            failed
        };
        lines.push(format!(
            "  {:<18} {:>8} {:>8} {:>8} {failed} {:>7.1}%",
            stage.label(),
            outcome.total,
            outcome.successful,
            outcome.skipped,
            outcome.success_rate()
        ));
    }

    let rate = format!("{:.1}%", report.overall_success_rate());
    let rate = if report.total_failed() > 0 {
        paint(rate, |s| s.yellow().to_string())
    } else {
        paint(rate, |s| s.green().to_string())
    };
    lines.push(format!(
        "  Overall: {} of {} item(s) processed ({rate})",
        report.total_successful(),
        report.total_items()
    ));

    lines.push(String::new());
    for (label, dir) in [
        ("Audio:", &config.audio_dir),
        ("Transcripts:", &config.transcripts_dir),
        ("Summaries:", &config.summaries_dir),
    ] {
        let label = paint(format!("{label:<13}"), |s| s.dimmed().to_string());
        lines.push(format!("  {label}{}", dir.display()));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Print the run summary to stdout.
pub fn print_report(report: &PipelineReport, config: &PipelineConfig) {
    use std::io::IsTerminal;
    print!(
        "{}",
        render_report(report, config, std::io::stdout().is_terminal())
    );
}
