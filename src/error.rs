//! Error types for callsum.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallsumError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Input errors
    #[error("Not found: {path}")]
    NotFound { path: String },

    // Media conversion errors
    #[error("Conversion failed: {message}")]
    Conversion { message: String },

    // Transcription / summarization backend errors
    #[error("{}", format_backend(*status, message))]
    Backend { status: Option<u16>, message: String },

    // Transcript merge errors
    #[error("Transcript merge failed: {message}")]
    Merge { message: String },

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<CallsumError>,
    },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid transcript JSON: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

fn format_backend(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Backend error (HTTP {code}): {message}"),
        None => format!("Backend error: {message}"),
    }
}

impl CallsumError {
    /// Shorthand for a missing input path.
    pub fn not_found(path: &std::path::Path) -> Self {
        CallsumError::NotFound {
            path: path.display().to_string(),
        }
    }

    /// Whether another attempt at the same call could succeed.
    ///
    /// Configuration problems, missing inputs, merge invariant violations and
    /// client-side HTTP errors fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            CallsumError::Configuration { .. }
            | CallsumError::ConfigParse(_)
            | CallsumError::NotFound { .. }
            | CallsumError::Merge { .. }
            | CallsumError::RetryExhausted { .. } => false,
            CallsumError::Backend {
                status: Some(code), ..
            } => !(400..500).contains(code) || *code == 408 || *code == 429,
            _ => true,
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, CallsumError>;
