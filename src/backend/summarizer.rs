use crate::defaults;
use crate::error::{CallsumError, Result};
use std::sync::{Arc, Mutex};

/// Summarization prompt with a `{transcript_text}` placeholder.
///
/// Passed explicitly into every call; there is no process-wide template.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Rejects templates without the placeholder.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains(defaults::TRANSCRIPT_PLACEHOLDER) {
            return Err(CallsumError::Configuration {
                message: format!(
                    "prompt template must contain {}",
                    defaults::TRANSCRIPT_PLACEHOLDER
                ),
            });
        }
        Ok(Self { template })
    }

    /// Substitute the transcript text for every placeholder.
    pub fn render(&self, transcript_text: &str) -> String {
        self.template
            .replace(defaults::TRANSCRIPT_PLACEHOLDER, transcript_text)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: defaults::SUMMARY_PROMPT.to_string(),
        }
    }
}

/// Trait for transcript summarization.
pub trait Summarizer: Send + Sync {
    /// Summarize `transcript_text` using `prompt`.
    fn summarize(&self, prompt: &PromptTemplate, transcript_text: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

impl<T: Summarizer + ?Sized> Summarizer for Arc<T> {
    fn summarize(&self, prompt: &PromptTemplate, transcript_text: &str) -> Result<String> {
        (**self).summarize(prompt, transcript_text)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock summarizer for testing
///
/// Records every rendered prompt.
#[derive(Debug)]
pub struct MockSummarizer {
    model_name: String,
    response: String,
    failures_left: Mutex<u32>,
    prompts: Mutex<Vec<String>>,
}

impl MockSummarizer {
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock summary".to_string(),
            failures_left: Mutex::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Fail the next `n` calls with a transient backend error
    pub fn with_failures(self, n: u32) -> Self {
        if let Ok(mut left) = self.failures_left.lock() {
            *left = n;
        }
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Summarizer for MockSummarizer {
    fn summarize(&self, prompt: &PromptTemplate, transcript_text: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.render(transcript_text));
        }
        if let Ok(mut left) = self.failures_left.lock()
            && *left > 0
        {
            *left -= 1;
            return Err(CallsumError::Backend {
                status: Some(500),
                message: "mock summarization failure".to_string(),
            });
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
