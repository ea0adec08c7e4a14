use crate::defaults;
use crate::error::{CallsumError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub models: ModelsConfig,
    pub backend: BackendConfig,
    pub pipeline: PipelineSettings,
    pub prompt: PromptConfig,
}

/// Stage directory layout
///
/// Per-stage directories default to `<data_dir>/<stage>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub videos_dir: Option<PathBuf>,
    pub audio_dir: Option<PathBuf>,
    pub transcripts_dir: Option<PathBuf>,
    pub summaries_dir: Option<PathBuf>,
}

/// Model identifiers sent to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelsConfig {
    pub transcription: String,
    pub summarization: String,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Omitted from the request when unset (some models reject it).
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Concurrency, retry and size limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub concurrency: usize,
    pub chunk_concurrency: usize,
    pub max_upload_bytes: u64,
    pub max_attempts: u32,
    /// First backoff delay, e.g. "1s" or "500ms".
    pub base_delay: String,
    pub limit: Option<usize>,
    pub keep_going: bool,
}

/// Summarization prompt source
///
/// `template_file` wins over `template`; both fall back to the built-in prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PromptConfig {
    pub template: Option<String>,
    pub template_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(defaults::DATA_DIR),
            videos_dir: None,
            audio_dir: None,
            transcripts_dir: None,
            summaries_dir: None,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            transcription: defaults::TRANSCRIPTION_MODEL.to_string(),
            summarization: defaults::SUMMARIZATION_MODEL.to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_BASE_URL.to_string(),
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_tokens: Some(defaults::SUMMARY_MAX_TOKENS),
            temperature: Some(defaults::SUMMARY_TEMPERATURE),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: defaults::CONCURRENCY,
            chunk_concurrency: defaults::CHUNK_CONCURRENCY,
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay: format!("{}ms", defaults::BASE_DELAY_MS),
            limit: None,
            keep_going: false,
        }
    }
}

impl PathsConfig {
    pub fn videos_dir(&self) -> PathBuf {
        self.resolve(&self.videos_dir, defaults::VIDEOS_DIR)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.resolve(&self.audio_dir, defaults::AUDIO_DIR)
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.resolve(&self.transcripts_dir, defaults::TRANSCRIPTS_DIR)
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.resolve(&self.summaries_dir, defaults::SUMMARIES_DIR)
    }

    /// Scratch directory for chunk files.
    pub fn scratch_dir(&self) -> PathBuf {
        self.transcripts_dir().join(defaults::SCRATCH_DIR_NAME)
    }

    fn resolve(&self, explicit: &Option<PathBuf>, stage: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.data_dir.join(stage))
    }
}

impl PipelineSettings {
    /// Parsed `base_delay`.
    pub fn base_delay(&self) -> Result<Duration> {
        humantime::parse_duration(self.base_delay.trim()).map_err(|e| {
            CallsumError::Configuration {
                message: format!("invalid pipeline.base_delay '{}': {e}", self.base_delay),
            }
        })
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(CallsumError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CALLSUM_DATA_DIR → paths.data_dir
    /// - CALLSUM_TRANSCRIPTION_MODEL → models.transcription
    /// - CALLSUM_SUMMARIZATION_MODEL → models.summarization
    /// - CALLSUM_CONCURRENCY → pipeline.concurrency (ignored unless a positive integer)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("CALLSUM_DATA_DIR")
            && !dir.is_empty()
        {
            self.paths.data_dir = PathBuf::from(dir);
        }

        if let Ok(model) = std::env::var("CALLSUM_TRANSCRIPTION_MODEL")
            && !model.is_empty()
        {
            self.models.transcription = model;
        }

        if let Ok(model) = std::env::var("CALLSUM_SUMMARIZATION_MODEL")
            && !model.is_empty()
        {
            self.models.summarization = model;
        }

        if let Ok(value) = std::env::var("CALLSUM_CONCURRENCY")
            && let Ok(concurrency) = value.trim().parse::<usize>()
            && concurrency > 0
        {
            self.pipeline.concurrency = concurrency;
        }

        self
    }

    /// Resolve the summarization prompt text.
    pub fn prompt_text(&self) -> Result<String> {
        if let Some(path) = &self.prompt.template_file {
            return fs::read_to_string(path).map_err(|e| CallsumError::Configuration {
                message: format!("cannot read prompt.template_file {}: {e}", path.display()),
            });
        }
        Ok(self
            .prompt
            .template
            .clone()
            .unwrap_or_else(|| defaults::SUMMARY_PROMPT.to_string()))
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| CallsumError::Configuration {
            message: format!("{key}: {message}"),
        };

        if self.pipeline.concurrency == 0 {
            return Err(invalid("pipeline.concurrency", "must be at least 1"));
        }
        if self.pipeline.chunk_concurrency == 0 {
            return Err(invalid("pipeline.chunk_concurrency", "must be at least 1"));
        }
        if self.pipeline.max_upload_bytes == 0 {
            return Err(invalid("pipeline.max_upload_bytes", "must be positive"));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(invalid("pipeline.max_attempts", "must be at least 1"));
        }
        self.pipeline.base_delay()?;
        Ok(())
    }

    /// Resolve the prompt and require the transcript placeholder.
    ///
    /// Separate from [`validate`](Self::validate): only runs that summarize
    /// read the prompt.
    pub fn validate_prompt(&self) -> Result<()> {
        let prompt = self.prompt_text()?;
        if !prompt.contains(defaults::TRANSCRIPT_PLACEHOLDER) {
            return Err(CallsumError::Configuration {
                message: format!(
                    "prompt: template must contain {}",
                    defaults::TRANSCRIPT_PLACEHOLDER
                ),
            });
        }
        Ok(())
    }

    /// Serialize back to TOML (used by `callsum config show|init`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CallsumError::Other(e.to_string()))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/callsum/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("callsum")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_callsum_env() {
        remove_env("CALLSUM_DATA_DIR");
        remove_env("CALLSUM_TRANSCRIPTION_MODEL");
        remove_env("CALLSUM_SUMMARIZATION_MODEL");
        remove_env("CALLSUM_CONCURRENCY");
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.paths.data_dir, PathBuf::from("data"));
        assert_eq!(config.paths.videos_dir(), PathBuf::from("data/videos"));
        assert_eq!(
            config.paths.scratch_dir(),
            PathBuf::from("data/transcripts/temp_chunks")
        );

        assert_eq!(config.models.transcription, "whisper-1");
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.pipeline.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(
            config.pipeline.base_delay().unwrap(),
            Duration::from_secs(1)
        );
        assert_eq!(config.pipeline.limit, None);
        assert!(!config.pipeline.keep_going);
        assert!(config.validate().is_ok());
        assert!(config.validate_prompt().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [paths]
            data_dir = "/srv/calls"
            summaries_dir = "/srv/out"

            [models]
            transcription = "whisper-large"
            summarization = "gpt-5"

            [backend]
            base_url = "http://localhost:8080/v1"
            timeout_secs = 30

            [pipeline]
            concurrency = 2
            chunk_concurrency = 3
            max_upload_bytes = 1048576
            max_attempts = 5
            base_delay = "250ms"
            limit = 10
            keep_going = true

            [prompt]
            template = "Summarize: {transcript_text}"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.paths.audio_dir(), PathBuf::from("/srv/calls/audio"));
        assert_eq!(config.paths.summaries_dir(), PathBuf::from("/srv/out"));
        assert_eq!(config.models.summarization, "gpt-5");
        assert_eq!(config.backend.base_url, "http://localhost:8080/v1");
        assert_eq!(config.backend.max_tokens, Some(1000));
        assert_eq!(config.pipeline.concurrency, 2);
        assert_eq!(
            config.pipeline.base_delay().unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(config.pipeline.limit, Some(10));
        assert!(config.pipeline.keep_going);
        assert_eq!(config.prompt_text().unwrap(), "Summarize: {transcript_text}");
        assert!(config.validate().is_ok());
        assert!(config.validate_prompt().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [models]
            transcription = "whisper-2"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.models.transcription, "whisper-2");
        assert_eq!(config.models.summarization, defaults::SUMMARIZATION_MODEL);
        assert_eq!(config.pipeline, PipelineSettings::default());
        assert_eq!(config.prompt_text().unwrap(), defaults::SUMMARY_PROMPT);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config("[paths\ndata_dir = \"broken");
        assert!(matches!(
            Config::load(temp_file.path()),
            Err(CallsumError::ConfigParse(_))
        ));
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_callsum_env();

        set_env("CALLSUM_DATA_DIR", "/tmp/calls");
        set_env("CALLSUM_SUMMARIZATION_MODEL", "gpt-5");
        set_env("CALLSUM_CONCURRENCY", "16");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/calls"));
        assert_eq!(config.models.summarization, "gpt-5");
        assert_eq!(config.models.transcription, "whisper-1"); // Not overridden
        assert_eq!(config.pipeline.concurrency, 16);

        clear_callsum_env();
    }

    #[test]
    fn test_env_override_empty_or_invalid_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_callsum_env();

        set_env("CALLSUM_TRANSCRIPTION_MODEL", "");
        set_env("CALLSUM_CONCURRENCY", "zero");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.models.transcription, "whisper-1");
        assert_eq!(config.pipeline.concurrency, defaults::CONCURRENCY);

        clear_callsum_env();
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.pipeline.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.base_delay = "soon".to_string();
        assert!(matches!(
            config.validate(),
            Err(CallsumError::Configuration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_prompt_without_placeholder() {
        let mut config = Config::default();
        config.prompt.template = Some("Summarize the call.".to_string());
        let err = config.validate_prompt().unwrap_err();
        assert!(err.to_string().contains("{transcript_text}"));
    }

    #[test]
    fn test_pipeline_validation_ignores_prompt() {
        let mut config = Config::default();
        config.prompt.template_file = Some(PathBuf::from("/nonexistent/prompt.txt"));

        assert!(config.validate().is_ok());
        assert!(matches!(
            config.validate_prompt(),
            Err(CallsumError::Configuration { .. })
        ));
    }

    #[test]
    fn test_template_file_wins_over_inline_template() {
        let file = write_config("From file: {transcript_text}");
        let mut config = Config::default();
        config.prompt.template = Some("Inline: {transcript_text}".to_string());
        config.prompt.template_file = Some(file.path().to_path_buf());

        assert_eq!(config.prompt_text().unwrap(), "From file: {transcript_text}");
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let config = Config::default();
        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("callsum"));
        assert!(path_str.ends_with("config.toml"));
    }
}
