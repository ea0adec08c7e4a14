//! Per-source scratch directory for chunk files.
//!
//! Every large file gets its own subdirectory under the shared scratch root,
//! named from the file's inode and a hash of its absolute path. Two sources
//! with the same basename in different directories never collide, and a
//! replaced file at the same path gets a new inode.

use crate::defaults;
use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// `chunk_<inode>_<first 8 hex chars of sha256(path)>`.
pub fn unique_prefix(source: &Path) -> Result<String> {
    let metadata = std::fs::metadata(source)?;
    let absolute = std::path::absolute(source)?;

    let digest = Sha256::digest(absolute.as_os_str().as_encoded_bytes());
    let hash: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    Ok(format!("chunk_{}_{hash}", file_identity(&metadata)))
}

#[cfg(unix)]
fn file_identity(metadata: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn file_identity(metadata: &std::fs::Metadata) -> u64 {
    metadata.len()
}

/// Scratch subdirectory owned by one file's transcription task.
///
/// Dropping the guard removes the subdirectory with everything in it. The
/// shared root is left in place for concurrent tasks; the stage removes it
/// with [`remove_root_if_empty`] once every task has finished.
#[derive(Debug)]
pub struct ScratchDir {
    root: PathBuf,
    dir: PathBuf,
    prefix: String,
    keep: bool,
}

impl ScratchDir {
    /// Create `<root>/<unique_prefix(source)>`.
    pub fn create(root: &Path, source: &Path) -> Result<Self> {
        let prefix = unique_prefix(source)?;
        let dir = root.join(&prefix);
        std::fs::create_dir_all(&dir)?;
        tracing::debug!("created scratch directory {}", dir.display());

        Ok(Self {
            root: root.to_path_buf(),
            dir,
            prefix,
            keep: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Shared root this subdirectory lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Audio file for chunk `index`: `<prefix>_<index:03>.mp3`.
    pub fn chunk_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}_{index:03}.{}",
            self.prefix,
            defaults::CHUNK_AUDIO_EXTENSION
        ))
    }

    /// Temporary transcript for chunk `index`.
    pub fn transcript_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}_{index:03}.{}",
            self.prefix,
            defaults::TRANSCRIPT_EXTENSION
        ))
    }

    /// Disarm cleanup and return the directory path.
    pub fn persist(mut self) -> PathBuf {
        self.keep = true;
        self.dir.clone()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(
                "failed to remove scratch directory {}: {e}",
                self.dir.display()
            );
        }
    }
}

/// Remove the shared scratch root unless something is still inside it.
///
/// Kept chunk directories from `callsum split` or leftovers of a crashed run
/// keep the root alive.
pub fn remove_root_if_empty(root: &Path) {
    match std::fs::remove_dir(root) {
        Ok(()) => tracing::debug!("removed scratch root {}", root.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("scratch root {} kept: {e}", root.display()),
    }
}
