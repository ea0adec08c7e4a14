//! System diagnostics and dependency checking.
//!
//! Verifies that the conversion tools are installed and the backend
//! credential is present before a long run starts.

use crate::config::Config;
use crate::defaults;
use std::process::Command;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool or setting is available
    Ok,
    /// Tool or setting is missing
    NotFound,
    /// Present but has issues (e.g., directory missing)
    Warning(String),
}

/// Check if a command exists and answers `-version` (ffmpeg style).
fn check_command(command: &str) -> CheckResult {
    match Command::new(command).arg("-version").output() {
        Ok(output) if output.status.success() => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("'{}' found but -version failed", command)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", command, e)),
    }
}

/// Check that the credential is set, from the environment or `.env`.
fn check_api_key(value: Option<String>) -> CheckResult {
    match value {
        Some(key) if key.trim().is_empty() => {
            CheckResult::Warning(format!("{} is set but empty", defaults::API_KEY_ENV))
        }
        Some(_) => CheckResult::Ok,
        None => CheckResult::NotFound,
    }
}

/// Check that the first stage has a directory to read from.
fn check_input_dir(config: &Config) -> CheckResult {
    let videos = config.paths.videos_dir();
    if videos.is_dir() {
        CheckResult::Ok
    } else if videos.exists() {
        CheckResult::Warning(format!("{} is not a directory", videos.display()))
    } else {
        CheckResult::NotFound
    }
}

fn print_tool(label: &str, command: &str) -> bool {
    print!("{label}: ");
    match check_command(command) {
        CheckResult::Ok => {
            println!("✓ OK");
            true
        }
        CheckResult::NotFound => {
            println!("✗ NOT FOUND");
            println!("  Install: sudo apt install ffmpeg  (Debian/Ubuntu)");
            println!("           sudo pacman -S ffmpeg    (Arch)");
            println!("           brew install ffmpeg      (macOS)");
            false
        }
        CheckResult::Warning(msg) => {
            println!("⚠ WARNING: {}", msg);
            false
        }
    }
}

/// Run all dependency checks and print results.
///
/// Returns `true` when a full pipeline run can start.
pub fn check_dependencies(config: &Config) -> bool {
    println!("Checking system dependencies...\n");

    let ffmpeg = print_tool("ffmpeg (audio extraction, chunking)", "ffmpeg");
    let ffprobe = print_tool("ffprobe (duration probing)", "ffprobe");

    print!("{} (transcription, summarization): ", defaults::API_KEY_ENV);
    let credential = match check_api_key(std::env::var(defaults::API_KEY_ENV).ok()) {
        CheckResult::Ok => {
            println!("✓ OK");
            true
        }
        CheckResult::NotFound => {
            println!("✗ NOT SET");
            println!(
                "  export {}=... or add it to a .env file",
                defaults::API_KEY_ENV
            );
            false
        }
        CheckResult::Warning(msg) => {
            println!("⚠ WARNING: {}", msg);
            false
        }
    };

    print!("Input directory: ");
    match check_input_dir(config) {
        CheckResult::Ok => println!("✓ {}", config.paths.videos_dir().display()),
        CheckResult::NotFound => println!(
            "- {} does not exist (nothing to extract)",
            config.paths.videos_dir().display()
        ),
        CheckResult::Warning(msg) => println!("⚠ WARNING: {}", msg),
    }

    println!();
    let ready = ffmpeg && ffprobe && credential;
    if ready {
        println!("✓ Ready to run the full pipeline.");
    } else if ffmpeg && ffprobe {
        println!("⚠ Audio extraction will work; transcription and summarization need the credential.");
    } else {
        println!("⚠ Install ffmpeg before running the pipeline.");
    }
    ready
}
