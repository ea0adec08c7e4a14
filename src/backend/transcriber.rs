use crate::error::{CallsumError, Result};
use crate::transcript::{Segment, Transcript};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real HTTP backend vs mock).
pub trait Transcriber: Send + Sync {
    /// Transcribe one audio file that fits within the upload limit.
    fn transcribe(&self, audio: &Path) -> Result<Transcript>;

    /// Model identifier sent with every request
    fn model_name(&self) -> &str;
}

/// Implement Transcriber for Arc<T> to allow sharing across stage workers.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &Path) -> Result<Transcript> {
        (**self).transcribe(audio)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock transcriber for testing
///
/// Returns a one-segment transcript of `duration` seconds whose text names
/// the input file.
#[derive(Debug)]
pub struct MockTranscriber {
    model_name: String,
    language: String,
    duration: f64,
    failures_left: Mutex<u32>,
    fail_on: Option<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            language: "english".to_string(),
            duration: 10.0,
            failures_left: Mutex::new(0),
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Duration reported for every transcribed file
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Fail the next `n` calls with a transient backend error
    pub fn with_failures(self, n: u32) -> Self {
        if let Ok(mut left) = self.failures_left.lock() {
            *left = n;
        }
        self
    }

    /// Always fail for files whose name contains `fragment`
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on = Some(fragment.to_string());
        self
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<Transcript> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(audio.to_path_buf());
        }

        let name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let forced = self
            .fail_on
            .as_deref()
            .is_some_and(|fragment| name.contains(fragment));
        let transient = match self.failures_left.lock() {
            Ok(mut left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        };
        if forced || transient {
            return Err(CallsumError::Backend {
                status: Some(503),
                message: "mock transcription failure".to_string(),
            });
        }

        let text = format!("mock transcription of {name}");
        Ok(Transcript {
            text: text.clone(),
            language: self.language.clone(),
            duration: self.duration,
            segments: vec![Segment {
                id: 0,
                start: 0.0,
                end: self.duration,
                text,
            }],
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
