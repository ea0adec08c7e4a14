//! Media conversion through ffmpeg/ffprobe.
//!
//! All conversions normalize to mono 16 kHz at a fixed low bitrate so that
//! the extracted audio stays well below the transcription upload limit.

use crate::defaults;
use crate::error::{CallsumError, Result};
use crate::media::executor::{CommandExecutor, SystemCommandExecutor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Duration probing and audio conversion.
pub trait MediaConverter: Send + Sync {
    /// Total duration of a media file in seconds.
    fn probe_duration(&self, input: &Path) -> Result<f64>;

    /// Convert a whole file (typically a video) to normalized audio.
    fn extract_audio(&self, input: &Path, output: &Path) -> Result<()>;

    /// Cut `[start, start + duration)` seconds out of `input` into `output`.
    fn extract_segment(&self, input: &Path, output: &Path, start: f64, duration: f64)
    -> Result<()>;
}

impl<T: MediaConverter + ?Sized> MediaConverter for std::sync::Arc<T> {
    fn probe_duration(&self, input: &Path) -> Result<f64> {
        (**self).probe_duration(input)
    }

    fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        (**self).extract_audio(input, output)
    }

    fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> Result<()> {
        (**self).extract_segment(input, output, start, duration)
    }
}

/// Converter backed by the ffmpeg and ffprobe binaries.
pub struct FfmpegConverter<E: CommandExecutor = SystemCommandExecutor> {
    executor: E,
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegConverter<SystemCommandExecutor> {
    /// Converter using `ffmpeg`/`ffprobe` from `PATH`.
    pub fn system() -> Self {
        Self::new(SystemCommandExecutor::new())
    }
}

impl<E: CommandExecutor> FfmpegConverter<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }

    /// Use explicit binaries instead of the ones on `PATH`.
    pub fn with_binaries(mut self, ffmpeg: &str, ffprobe: &str) -> Self {
        self.ffmpeg = ffmpeg.to_string();
        self.ffprobe = ffprobe.to_string();
        self
    }

    fn normalization_args() -> Vec<String> {
        vec![
            "-ac".to_string(),
            defaults::CHANNELS.to_string(),
            "-ar".to_string(),
            defaults::SAMPLE_RATE.to_string(),
            "-b:a".to_string(),
            defaults::AUDIO_BITRATE.to_string(),
        ]
    }

    fn run_ffmpeg(&self, args: Vec<String>, output: &Path) -> Result<()> {
        self.executor.execute(&self.ffmpeg, &args)?;

        // Some ffmpeg failures exit 0 without writing anything.
        if !output.is_file() {
            return Err(CallsumError::Conversion {
                message: format!(
                    "{} reported success but {} was not created",
                    self.ffmpeg,
                    output.display()
                ),
            });
        }
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn ensure_input(input: &Path) -> Result<()> {
    if !input.exists() {
        return Err(CallsumError::not_found(input));
    }
    if !input.is_file() {
        return Err(CallsumError::NotFound {
            path: format!("{} (not a file)", input.display()),
        });
    }
    Ok(())
}

/// Parse the single number ffprobe prints for `format=duration`.
pub fn parse_duration(stdout: &str, input: &Path) -> Result<f64> {
    let trimmed = stdout.trim();
    let duration: f64 = trimmed.parse().map_err(|_| CallsumError::Conversion {
        message: format!(
            "could not read duration of {} from probe output '{}'",
            input.display(),
            trimmed
        ),
    })?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(CallsumError::Conversion {
            message: format!("{} has invalid duration {duration}", input.display()),
        });
    }
    Ok(duration)
}

impl<E: CommandExecutor> MediaConverter for FfmpegConverter<E> {
    fn probe_duration(&self, input: &Path) -> Result<f64> {
        ensure_input(input)?;
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "csv=p=0".to_string(),
            path_arg(input),
        ];
        let stdout = self.executor.execute(&self.ffprobe, &args)?;
        parse_duration(&stdout, input)
    }

    fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        ensure_input(input)?;
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut args = vec!["-i".to_string(), path_arg(input), "-vn".to_string()];
        args.extend(Self::normalization_args());
        args.push("-y".to_string());
        args.push(path_arg(output));

        self.run_ffmpeg(args, output)
    }

    fn extract_segment(
        &self,
        input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> Result<()> {
        ensure_input(input)?;

        let mut args = vec![
            "-i".to_string(),
            path_arg(input),
            "-ss".to_string(),
            format!("{start:.6}"),
            "-t".to_string(),
            format!("{duration:.6}"),
        ];
        args.extend(Self::normalization_args());
        args.extend([
            "-avoid_negative_ts".to_string(),
            "make_zero".to_string(),
            "-y".to_string(),
            path_arg(output),
        ]);

        self.run_ffmpeg(args, output)
    }
}

/// One recorded call on a [`MockConverter`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConverterCall {
    Probe(PathBuf),
    Extract { input: PathBuf, output: PathBuf },
    Segment { output: PathBuf, start: f64, duration: f64 },
}

/// Mock converter for testing
///
/// Writes small placeholder files instead of running ffmpeg and records every
/// call. Segment files are written with `segment_bytes` bytes.
#[derive(Debug)]
pub struct MockConverter {
    duration: f64,
    segment_bytes: u64,
    failures_left: Mutex<u32>,
    calls: Mutex<Vec<ConverterCall>>,
}

impl MockConverter {
    /// Create a mock that reports `duration` seconds for every probe.
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            segment_bytes: 1024,
            failures_left: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Size of generated segment files.
    pub fn with_segment_bytes(mut self, bytes: u64) -> Self {
        self.segment_bytes = bytes;
        self
    }

    /// Fail the next `n` calls with a conversion error.
    pub fn with_failures(self, n: u32) -> Self {
        if let Ok(mut left) = self.failures_left.lock() {
            *left = n;
        }
        self
    }

    pub fn calls(&self) -> Vec<ConverterCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn record(&self, call: ConverterCall) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if let Ok(mut left) = self.failures_left.lock()
            && *left > 0
        {
            *left -= 1;
            return Err(CallsumError::Conversion {
                message: "mock conversion failure".to_string(),
            });
        }
        Ok(())
    }
}

impl MediaConverter for MockConverter {
    fn probe_duration(&self, input: &Path) -> Result<f64> {
        self.record(ConverterCall::Probe(input.to_path_buf()))?;
        Ok(self.duration)
    }

    fn extract_audio(&self, input: &Path, output: &Path) -> Result<()> {
        self.record(ConverterCall::Extract {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        })?;
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, b"RIFF mock audio")?;
        Ok(())
    }

    fn extract_segment(
        &self,
        _input: &Path,
        output: &Path,
        start: f64,
        duration: f64,
    ) -> Result<()> {
        self.record(ConverterCall::Segment {
            output: output.to_path_buf(),
            start,
            duration,
        })?;
        // Sparse, so large sizes cost no disk space.
        std::fs::File::create(output)?.set_len(self.segment_bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::executor::MockCommandExecutor;
    use std::sync::Arc;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_parse_duration_accepts_ffprobe_output() {
        let d = parse_duration("1834.560000\n", Path::new("a.wav")).unwrap();
        assert!((d - 1834.56).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("N/A\n", Path::new("a.wav")).is_err());
        assert!(parse_duration("", Path::new("a.wav")).is_err());
        assert!(parse_duration("0.0", Path::new("a.wav")).is_err());
        assert!(parse_duration("-3", Path::new("a.wav")).is_err());
    }

    #[test]
    fn test_probe_builds_ffprobe_command() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("call.wav");
        touch(&input);

        let executor = Arc::new(MockCommandExecutor::new().with_response("42.5\n"));
        let converter = FfmpegConverter::new(executor.clone());

        assert_eq!(converter.probe_duration(&input).unwrap(), 42.5);
        let calls = executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "ffprobe");
        assert!(calls[0].1.contains(&"format=duration".to_string()));
        assert_eq!(calls[0].1.last().unwrap(), &input.to_string_lossy());
    }

    #[test]
    fn test_missing_input_is_not_found_without_subprocess() {
        let executor = Arc::new(MockCommandExecutor::new());
        let converter = FfmpegConverter::new(executor.clone());

        let err = converter
            .probe_duration(Path::new("/nonexistent/call.wav"))
            .unwrap_err();
        assert!(matches!(err, CallsumError::NotFound { .. }));
        assert_eq!(executor.call_count(), 0);
    }

    #[test]
    fn test_directory_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let converter = FfmpegConverter::new(MockCommandExecutor::new());
        let err = converter
            .extract_audio(dir.path(), &dir.path().join("out.wav"))
            .unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }

    #[test]
    fn test_extract_audio_normalizes_to_mono_16k() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("meeting.mp4");
        let output = dir.path().join("audio").join("meeting.wav");
        touch(&input);
        std::fs::create_dir_all(output.parent().unwrap()).unwrap();
        touch(&output);

        let executor = Arc::new(MockCommandExecutor::new());
        let converter = FfmpegConverter::new(executor.clone());
        converter.extract_audio(&input, &output).unwrap();

        let (command, args) = &executor.calls()[0];
        assert_eq!(command, "ffmpeg");
        let joined = args.join(" ");
        assert!(joined.contains("-ac 1"));
        assert!(joined.contains("-ar 16000"));
        assert!(joined.contains("-b:a 64k"));
        assert!(joined.ends_with(&format!("-y {}", output.display())));
    }

    #[test]
    fn test_extract_segment_passes_offsets() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("long.wav");
        let output = dir.path().join("chunk_001.wav");
        touch(&input);
        touch(&output);

        let executor = Arc::new(MockCommandExecutor::new());
        let converter = FfmpegConverter::new(executor.clone());
        converter
            .extract_segment(&input, &output, 600.0, 300.5)
            .unwrap();

        let args = &executor.calls()[0].1;
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "600.000000");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "300.500000");
        assert!(args.contains(&"make_zero".to_string()));
    }

    #[test]
    fn test_silent_non_creation_is_a_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("long.wav");
        touch(&input);

        // Mock exits "successfully" but never writes the output.
        let converter = FfmpegConverter::new(MockCommandExecutor::new());
        let err = converter
            .extract_segment(&input, &dir.path().join("missing.wav"), 0.0, 10.0)
            .unwrap_err();
        match err {
            CallsumError::Conversion { message } => {
                assert!(message.contains("was not created"))
            }
            other => panic!("expected Conversion error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_zero_exit_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("long.wav");
        touch(&input);

        let executor = MockCommandExecutor::new().with_error(CallsumError::Conversion {
            message: "ffmpeg failed with exit status: 1".to_string(),
        });
        let converter = FfmpegConverter::new(executor);
        let err = converter
            .extract_audio(&input, &dir.path().join("out.wav"))
            .unwrap_err();
        assert!(err.to_string().contains("exit status: 1"));
    }

    #[test]
    fn test_custom_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.wav");
        touch(&input);

        let executor = Arc::new(MockCommandExecutor::new().with_response("1.0"));
        let converter =
            FfmpegConverter::new(executor.clone()).with_binaries("/opt/ff/ffmpeg", "/opt/ff/ffprobe");
        converter.probe_duration(&input).unwrap();
        assert_eq!(executor.calls()[0].0, "/opt/ff/ffprobe");
    }

    #[test]
    fn test_mock_converter_failures_then_success() {
        let dir = tempfile::tempdir().unwrap();
        let converter = MockConverter::new(10.0).with_failures(1);
        let out = dir.path().join("a.wav");

        assert!(converter.extract_audio(Path::new("v.mp4"), &out).is_err());
        converter.extract_audio(Path::new("v.mp4"), &out).unwrap();
        assert!(out.exists());
        assert_eq!(converter.call_count(), 2);
    }
}
