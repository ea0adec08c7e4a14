//! Directory scanning for stage inputs.

use crate::defaults;
use crate::error::{CallsumError, Result};
use std::path::{Path, PathBuf};

/// Category of a discovered file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Transcript,
    Summary,
}

impl MediaKind {
    /// Extensions belonging to this kind (lowercase, without dot).
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => defaults::VIDEO_EXTENSIONS,
            MediaKind::Audio => defaults::AUDIO_EXTENSIONS,
            MediaKind::Transcript => &[defaults::TRANSCRIPT_EXTENSION],
            MediaKind::Summary => &[defaults::SUMMARY_EXTENSION],
        }
    }

    /// Classify a path by extension, case-insensitively.
    ///
    /// `.wav` is audio even though it is also what extraction writes.
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        [
            MediaKind::Video,
            MediaKind::Audio,
            MediaKind::Transcript,
            MediaKind::Summary,
        ]
        .into_iter()
        .find(|kind| kind.extensions().contains(&ext.as_str()))
    }
}

/// A file found by a stage scan. Identity is the absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    path: PathBuf,
    kind: MediaKind,
}

impl MediaFile {
    /// Wrap a path, absolutizing it against the current directory.
    pub fn new(path: &Path, kind: MediaKind) -> Result<Self> {
        let path = std::path::absolute(path)?;
        Ok(Self { path, kind })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// File name without extension; names the stage output.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name for progress display.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// `<dir>/<stem>.<extension>`, the canonical output of this file.
    pub fn output_in(&self, dir: &Path, extension: &str) -> PathBuf {
        dir.join(format!("{}.{}", self.stem(), extension))
    }

    pub fn size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }
}

/// List the files of `kind` directly inside `dir`, sorted by path.
///
/// Subdirectories (such as the chunk scratch directory) are not descended
/// into. `limit` keeps only the first N files.
pub fn scan(dir: &Path, kind: MediaKind, limit: Option<usize>) -> Result<Vec<MediaFile>> {
    if !dir.is_dir() {
        return Err(CallsumError::not_found(dir));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && MediaKind::of(&path) == Some(kind) {
            paths.push(path);
        }
    }
    paths.sort();

    if let Some(limit) = limit.filter(|&n| n > 0) {
        paths.truncate(limit);
    }

    paths
        .iter()
        .map(|path| MediaFile::new(path, kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_kind_detection_is_case_insensitive() {
        assert_eq!(MediaKind::of(Path::new("a.MP4")), Some(MediaKind::Video));
        assert_eq!(MediaKind::of(Path::new("a.mkv")), Some(MediaKind::Video));
        assert_eq!(MediaKind::of(Path::new("a.Wav")), Some(MediaKind::Audio));
        assert_eq!(MediaKind::of(Path::new("a.flac")), Some(MediaKind::Audio));
        assert_eq!(MediaKind::of(Path::new("a.json")), Some(MediaKind::Transcript));
        assert_eq!(MediaKind::of(Path::new("a.txt")), Some(MediaKind::Summary));
        assert_eq!(MediaKind::of(Path::new("a.pdf")), None);
        assert_eq!(MediaKind::of(Path::new("noext")), None);
    }

    #[test]
    fn test_scan_filters_sorts_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.mp4");
        touch(dir.path(), "a.MOV");
        touch(dir.path(), "notes.txt");
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let files = scan(dir.path(), MediaKind::Video, None).unwrap();
        let names: Vec<String> = files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a.MOV", "b.mp4"]);
        assert!(files.iter().all(|f| f.path().is_absolute()));
    }

    #[test]
    fn test_scan_applies_limit() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.wav", "a.wav", "b.mp3"] {
            touch(dir.path(), name);
        }

        let files = scan(dir.path(), MediaKind::Audio, Some(2)).unwrap();
        let names: Vec<String> = files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a.wav", "b.mp3"]);

        // Zero means "no limit", matching the CLI default.
        assert_eq!(scan(dir.path(), MediaKind::Audio, Some(0)).unwrap().len(), 3);
    }

    #[test]
    fn test_scan_missing_dir_is_not_found() {
        let err = scan(Path::new("/nonexistent/videos"), MediaKind::Video, None).unwrap_err();
        assert!(matches!(err, CallsumError::NotFound { .. }));
    }

    #[test]
    fn test_output_path_uses_stem() {
        let file = MediaFile::new(Path::new("/data/videos/Weekly Sync.mp4"), MediaKind::Video)
            .unwrap();
        assert_eq!(file.stem(), "Weekly Sync");
        assert_eq!(
            file.output_in(Path::new("/data/audio"), "wav"),
            PathBuf::from("/data/audio/Weekly Sync.wav")
        );
    }
}
