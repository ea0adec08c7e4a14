//! Default configuration constants for callsum.
//!
//! Shared by the config layer, the CLI and the pipeline so that a value only
//! has to change in one place.

/// Hard upload ceiling of the transcription backend (25 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Shortest chunk worth splitting off, in seconds.
///
/// Below this the planner keeps the file whole.
pub const MIN_CHUNK_SECS: f64 = 1.0;

/// Sample rate used for every conversion, in Hz.
pub const SAMPLE_RATE: u32 = 16000;

/// Mono output.
pub const CHANNELS: u32 = 1;

/// Bitrate passed to the converter for compressed output.
pub const AUDIO_BITRATE: &str = "64k";

/// Maximum number of attempts for one external call.
pub const MAX_ATTEMPTS: u32 = 3;

/// First backoff delay; doubles on every retry.
pub const BASE_DELAY_MS: u64 = 1000;

/// Number of files processed in parallel within a stage.
pub const CONCURRENCY: usize = 8;

/// Number of chunks of a single large file transcribed in parallel.
pub const CHUNK_CONCURRENCY: usize = 4;

/// Default speech-to-text model.
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Default summarization model.
pub const SUMMARIZATION_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible API root.
pub const API_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the backend credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// HTTP timeout for one backend request, in seconds.
///
/// A 25 MiB upload plus server-side transcription can take minutes.
pub const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Token budget for one summary.
pub const SUMMARY_MAX_TOKENS: u32 = 1000;

/// Sampling temperature for summaries.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Default root holding the stage directories.
pub const DATA_DIR: &str = "data";

/// Stage directory names below the data root.
pub const VIDEOS_DIR: &str = "videos";
pub const AUDIO_DIR: &str = "audio";
pub const TRANSCRIPTS_DIR: &str = "transcripts";
pub const SUMMARIES_DIR: &str = "summaries";

/// Scratch directory for chunk files, created under the transcripts directory.
pub const SCRATCH_DIR_NAME: &str = "temp_chunks";

/// Extensions picked up by the extraction stage (matched case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv", "m4v"];

/// Extensions picked up by the transcription stage.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac", "ogg", "aac"];

/// Extension of chunk files cut from oversized audio.
///
/// A compressed format, so that [`AUDIO_BITRATE`] actually bounds the size.
pub const CHUNK_AUDIO_EXTENSION: &str = "mp3";

/// Extension of transcript files.
pub const TRANSCRIPT_EXTENSION: &str = "json";

/// Extension of summary files.
pub const SUMMARY_EXTENSION: &str = "txt";

/// Extension written by the extraction stage.
pub const EXTRACTED_AUDIO_EXTENSION: &str = "wav";

/// Placeholder substituted with the transcript text.
pub const TRANSCRIPT_PLACEHOLDER: &str = "{transcript_text}";

/// System message sent with every summarization request.
pub const SUMMARY_SYSTEM_MESSAGE: &str = "You are a helpful assistant that creates clear, \
comprehensive summaries of business conversations and meetings.";

/// Prompt used when the configuration does not provide one.
pub const SUMMARY_PROMPT: &str = "Please provide a comprehensive summary of the following conversation transcript.

Key points to include in the summary:
- Main topics discussed
- Key decisions made
- Action items or next steps
- Important details or agreements
- Overall tone and context

The majority of the summary should be focused on discussions around pricing, if they occur. If they do not discuss pricing of any products, please indicate.

The pricing conversation should take the following output:
- Pricing offer (ie. what was the amount of money estimated), with specifics in terms of how much was offered for the platform vs. user licenses
- Reaction to pricing (what was the prospect's feedback on the pricing, if any)
- Customer budget, if indicated
- Pricing comparison to competitors, if any (did the customer tell us what competitor pricing is, and how they felt about it). Please specify which competitors, if discussed.

Transcript:
{transcript_text}

Please provide a clear, structured summary that captures the essence of this conversation.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_is_25_mib() {
        assert_eq!(MAX_UPLOAD_BYTES, 26_214_400);
    }

    #[test]
    fn default_prompt_contains_placeholder_once() {
        assert_eq!(SUMMARY_PROMPT.matches(TRANSCRIPT_PLACEHOLDER).count(), 1);
    }

    #[test]
    fn extension_sets_are_lowercase() {
        for ext in VIDEO_EXTENSIONS.iter().chain(AUDIO_EXTENSIONS) {
            assert_eq!(*ext, ext.to_lowercase());
        }
    }
}
