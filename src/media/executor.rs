//! Subprocess execution behind a trait so converters can be tested without
//! ffmpeg installed.

use crate::error::{CallsumError, Result};
use std::process::Command;

/// Trait for executing external tools.
///
/// Object-safe, Send + Sync so one executor can be shared by all pool workers.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments.
    ///
    /// Returns the stdout of the command on success.
    /// Returns `Conversion` if the tool is missing or exits non-zero.
    fn execute(&self, command: &str, args: &[String]) -> Result<String>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for std::sync::Arc<T> {
    fn execute(&self, command: &str, args: &[String]) -> Result<String> {
        (**self).execute(command, args)
    }
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[String]) -> Result<String> {
        tracing::debug!("running {} {}", command, args.join(" "));

        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CallsumError::Conversion {
                    message: format!(
                        "{command} not found. Install ffmpeg:\n\
                         Ubuntu/Debian: sudo apt install ffmpeg\n\
                         macOS: brew install ffmpeg"
                    ),
                }
            } else {
                CallsumError::Conversion {
                    message: format!("Failed to execute {command}: {e}"),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CallsumError::Conversion {
                message: format!(
                    "{} failed with {}: {}",
                    command,
                    output.status,
                    last_lines(&stderr, 5)
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// ffmpeg prints its banner first; the cause is at the end.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Mock command executor for testing.
///
/// Records every call and pops queued responses; an empty queue answers with
/// an empty stdout.
#[derive(Debug, Default)]
pub struct MockCommandExecutor {
    calls: std::sync::Mutex<Vec<(String, Vec<String>)>>,
    responses: std::sync::Mutex<std::collections::VecDeque<Result<String>>>,
}

impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a successful response to the queue.
    pub fn with_response(self, response: &str) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response.to_string()));
        }
        self
    }

    /// Add an error response to the queue.
    pub fn with_error(self, error: CallsumError) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Get the number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[String]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((command.to_string(), args.to_vec()));
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mock_records_calls_in_order() {
        let executor = MockCommandExecutor::new()
            .with_response("12.5\n")
            .with_response("");

        assert_eq!(
            executor.execute("ffprobe", &args(&["a.wav"])).unwrap(),
            "12.5\n"
        );
        executor.execute("ffmpeg", &args(&["-i", "a.wav"])).unwrap();

        assert_eq!(executor.call_count(), 2);
        let calls = executor.calls();
        assert_eq!(calls[0].0, "ffprobe");
        assert_eq!(calls[1].1, args(&["-i", "a.wav"]));
    }

    #[test]
    fn test_mock_returns_queued_error_then_default() {
        let executor = MockCommandExecutor::new().with_error(CallsumError::Conversion {
            message: "exit 1".to_string(),
        });

        assert!(executor.execute("ffmpeg", &[]).is_err());
        assert_eq!(executor.execute("ffmpeg", &[]).unwrap(), "");
    }

    #[test]
    fn test_system_executor_reports_missing_tool() {
        let executor = SystemCommandExecutor::new();
        let err = executor
            .execute("callsum-definitely-not-installed", &[])
            .unwrap_err();
        match err {
            CallsumError::Conversion { message } => assert!(message.contains("not found")),
            other => panic!("expected Conversion error, got {other:?}"),
        }
    }

    #[test]
    fn test_last_lines_keeps_tail() {
        let text = "banner\nconfig\ninput\nerror: bad file\n";
        assert_eq!(last_lines(text, 2), "input\nerror: bad file");
        assert_eq!(last_lines("one", 5), "one");
    }

    #[test]
    fn test_executor_is_object_safe() {
        let executor: Box<dyn CommandExecutor> =
            Box::new(MockCommandExecutor::new().with_response("ok"));
        assert_eq!(executor.execute("ffmpeg", &[]).unwrap(), "ok");
    }
}
