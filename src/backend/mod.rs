//! Transcription and summarization backends.

#[cfg(feature = "openai")]
pub mod openai;
pub mod summarizer;
pub mod transcriber;

#[cfg(feature = "openai")]
pub use openai::{ApiClient, OpenAiSummarizer, OpenAiTranscriber};
pub use summarizer::{MockSummarizer, PromptTemplate, Summarizer};
pub use transcriber::{MockTranscriber, Transcriber};
