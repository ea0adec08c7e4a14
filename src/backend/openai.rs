//! OpenAI-compatible HTTP backend (blocking).
//!
//! Requests run on stage worker threads, so the blocking client is used
//! directly; no async runtime is involved.

use crate::backend::{PromptTemplate, Summarizer, Transcriber};
use crate::config::Config;
use crate::defaults;
use crate::error::{CallsumError, Result};
use crate::transcript::Transcript;
use reqwest::blocking::{Client, Response, multipart};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const RESPONSE_FORMAT: &str = "verbose_json";

/// Connection shared by the transcriber and the summarizer.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ApiClient {
    /// Build a client from explicit settings.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(missing_key());
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallsumError::Configuration {
                message: format!("cannot create HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Build a client with the credential from `OPENAI_API_KEY`.
    ///
    /// A missing credential is a configuration error, never retried.
    pub fn from_env(config: &Config) -> Result<Self> {
        let api_key = std::env::var(defaults::API_KEY_ENV).map_err(|_| missing_key())?;
        Self::new(
            &config.backend.base_url,
            &api_key,
            Duration::from_secs(config.backend.timeout_secs),
        )
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }
}

fn missing_key() -> CallsumError {
    CallsumError::Configuration {
        message: format!("{} environment variable not set", defaults::API_KEY_ENV),
    }
}

fn request_error(e: reqwest::Error) -> CallsumError {
    CallsumError::Backend {
        status: e.status().map(|s| s.as_u16()),
        message: if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        },
    }
}

/// Turn a non-2xx response into a `Backend` error carrying the status.
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(CallsumError::Backend {
        status: Some(status.as_u16()),
        message: error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string()),
    })
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
}

/// Speech-to-text over `/audio/transcriptions`.
#[derive(Debug, Clone)]
pub struct OpenAiTranscriber {
    client: ApiClient,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(client: ApiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

impl Transcriber for OpenAiTranscriber {
    fn transcribe(&self, audio: &Path) -> Result<Transcript> {
        if !audio.is_file() {
            return Err(CallsumError::not_found(audio));
        }
        tracing::debug!("transcribing {} with {}", audio.display(), self.model);

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", RESPONSE_FORMAT)
            .file("file", audio)?;

        let response = self
            .client
            .http
            .post(self.client.url("audio/transcriptions"))
            .bearer_auth(&self.client.api_key)
            .multipart(form)
            .send()
            .map_err(request_error)?;

        let body = check_status(response)?.text().map_err(request_error)?;
        Ok(serde_json::from_str(&body)?)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Summaries over `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiSummarizer {
    client: ApiClient,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAiSummarizer {
    pub fn new(client: ApiClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            max_tokens: Some(defaults::SUMMARY_MAX_TOKENS),
            temperature: Some(defaults::SUMMARY_TEMPERATURE),
        }
    }

    /// `None` omits the field from the request.
    pub fn with_sampling(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn request<'a>(&'a self, user_prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: defaults::SUMMARY_SYSTEM_MESSAGE,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl Summarizer for OpenAiSummarizer {
    fn summarize(&self, prompt: &PromptTemplate, transcript_text: &str) -> Result<String> {
        let user_prompt = prompt.render(transcript_text);
        tracing::debug!(
            "summarizing {} chars with {}",
            transcript_text.len(),
            self.model
        );

        let response = self
            .client
            .http
            .post(self.client.url("chat/completions"))
            .bearer_auth(&self.client.api_key)
            .json(&self.request(&user_prompt))
            .send()
            .map_err(request_error)?;

        let body = check_status(response)?.text().map_err(request_error)?;
        parse_chat_response(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn parse_chat_response(body: &str) -> Result<String> {
    let chat: ChatResponse = serde_json::from_str(body)?;
    chat.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| CallsumError::Backend {
            status: None,
            message: "response contained no summary".to_string(),
        })
}
