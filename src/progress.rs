//! Task lifecycle notifications.
//!
//! Reporters are called concurrently from stage workers and must guard their
//! own state.

use crate::stage::{Stage, StageOutcome};

/// How a single item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Skipped,
    Failed,
}

/// Receiver of pipeline progress events.
///
/// Every method has an empty default so reporters implement only what they
/// display.
pub trait ProgressReporter: Send + Sync {
    /// A stage is about to process `total` discovered items.
    fn stage_started(&self, _stage: Stage, _total: usize) {}

    /// A worker picked up `name`.
    fn task_started(&self, _stage: Stage, _name: &str) {}

    /// `completed` of `total` chunks of `name` are transcribed.
    fn chunk_progress(&self, _name: &str, _completed: usize, _total: usize) {}

    fn task_finished(&self, _stage: Stage, _name: &str, _status: TaskStatus, _message: &str) {}

    fn stage_finished(&self, _stage: Stage, _outcome: &StageOutcome) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {}

/// Reporter that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn stage_started(&self, stage: Stage, total: usize) {
        tracing::info!("{}: {total} file(s) found", stage.label());
    }

    fn task_started(&self, stage: Stage, name: &str) {
        tracing::debug!("{}: started {name}", stage.label());
    }

    fn chunk_progress(&self, name: &str, completed: usize, total: usize) {
        tracing::debug!("{name}: chunk {completed}/{total} transcribed");
    }

    fn task_finished(&self, stage: Stage, name: &str, status: TaskStatus, message: &str) {
        match status {
            TaskStatus::Failed => tracing::error!("{}: {name}: {message}", stage.label()),
            _ => tracing::info!("{}: {name}: {message}", stage.label()),
        }
    }

    fn stage_finished(&self, stage: Stage, outcome: &StageOutcome) {
        tracing::info!(
            "{}: {} successful, {} skipped, {} failed ({:.1}%)",
            stage.label(),
            outcome.successful,
            outcome.skipped,
            outcome.failed,
            outcome.success_rate()
        );
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn capture(events: impl FnOnce(&LogReporter)) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || events(&LogReporter));
        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_log_reporter_writes_lifecycle() {
        let output = capture(|reporter| {
            reporter.stage_started(Stage::Transcription, 2);
            reporter.chunk_progress("call.wav", 1, 3);
            reporter.task_finished(Stage::Transcription, "bad.wav", TaskStatus::Failed, "HTTP 413");
            reporter.stage_finished(
                Stage::Transcription,
                &StageOutcome {
                    successful: 1,
                    skipped: 0,
                    failed: 1,
                    total: 2,
                },
            );
        });

        assert!(output.contains("Transcription: 2 file(s) found"));
        assert!(output.contains("call.wav: chunk 1/3 transcribed"));
        assert!(output.contains("ERROR"));
        assert!(output.contains("bad.wav: HTTP 413"));
        assert!(output.contains("1 successful, 0 skipped, 1 failed (50.0%)"));
    }
}
