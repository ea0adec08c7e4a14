//! External media tooling: subprocess execution, ffmpeg conversion and
//! stage input discovery.

pub mod converter;
pub mod discovery;
pub mod executor;

pub use converter::{FfmpegConverter, MediaConverter, MockConverter};
pub use discovery::{MediaFile, MediaKind, scan};
pub use executor::{CommandExecutor, MockCommandExecutor, SystemCommandExecutor};
