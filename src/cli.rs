//! Command-line interface for callsum
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Turn call recordings into transcripts and summaries
#[derive(Parser, Debug)]
#[command(
    name = "callsum",
    version,
    about = "Extract, transcribe and summarize recorded calls"
)]
pub struct Cli {
    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress output and warnings
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info logs, -vv: debug logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Environment file read before the configuration [default: ./.env]
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Root directory holding videos/, audio/, transcripts/ and summaries/
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Process only the first N files of each stage (0 = all)
    #[arg(long, global = true, value_name = "N")]
    pub limit: Option<usize>,

    /// Files processed in parallel per stage
    #[arg(long, global = true, value_name = "N", value_parser = parse_positive)]
    pub concurrency: Option<usize>,

    /// Count failed files and continue instead of stopping at the first failure
    #[arg(long, global = true)]
    pub keep_going: bool,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Parse a byte size: plain bytes or a K/M/G (binary) suffix.
fn parse_bytes(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => {
            let multiplier = match c.to_ascii_uppercase() {
                'K' => 1024,
                'M' => 1024 * 1024,
                'G' => 1024 * 1024 * 1024,
                _ => return Err(format!("unknown size suffix '{c}' (use K, M or G)")),
            };
            (&s[..i], multiplier)
        }
        _ => (s, 1),
    };
    let value: u64 = digits.trim().parse().map_err(|e| format!("invalid size '{s}': {e}"))?;
    match value.checked_mul(multiplier) {
        Some(0) => Err("size must be positive".to_string()),
        Some(bytes) => Ok(bytes),
        None => Err(format!("size '{s}' is too large")),
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all three stages: extract, transcribe, summarize
    Run,

    /// Extract audio from videos/ into audio/
    Extract,

    /// Transcribe audio/ into transcripts/, splitting large files
    Transcribe,

    /// Summarize transcripts/ into summaries/
    Summarize,

    /// Split one audio file into upload-sized chunks and print the plan
    Split {
        /// Audio file to split
        file: PathBuf,

        /// Directory receiving the chunk files (default: <data-dir>/transcripts/temp_chunks)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Maximum chunk size, e.g. 25M (default: upload limit)
        #[arg(long, value_name = "SIZE", value_parser = parse_bytes)]
        max_bytes: Option<u64>,
    },

    /// Merge chunk transcripts, given in chunk order, into one transcript
    Merge {
        /// Output transcript path
        output: PathBuf,

        /// Chunk transcript JSON files
        #[arg(required = true, value_name = "CHUNK")]
        chunks: Vec<PathBuf>,
    },

    /// Check system dependencies and credentials
    Check,

    /// View and create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment + flags)
    Show,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
