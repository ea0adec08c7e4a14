use anyhow::{Context, Result};
use callsum::app::{merge_files, run_split_command, run_stages_command};
use callsum::cli::{Cli, Commands, ConfigAction};
use callsum::config::Config;
use callsum::diagnostics::check_dependencies;
use callsum::stage::Stage;
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    tracing::debug!("callsum {}", callsum::version_string());

    if let Err(e) = run(cli) {
        eprintln!("{}", format!("callsum: FATAL: {e:#}").red());
        std::process::exit(1);
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the flags.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    // Before any config is built, so `.env` feeds the CALLSUM_* overrides too.
    load_dotenv(cli.env_file.as_deref())?;

    match &cli.command {
        None | Some(Commands::Run) => run_stages(&cli_config(&cli)?, &Stage::ALL, cli.quiet),
        Some(Commands::Extract) => run_stages(&cli_config(&cli)?, &[Stage::Extraction], cli.quiet),
        Some(Commands::Transcribe) => {
            run_stages(&cli_config(&cli)?, &[Stage::Transcription], cli.quiet)
        }
        Some(Commands::Summarize) => {
            run_stages(&cli_config(&cli)?, &[Stage::Summarization], cli.quiet)
        }
        Some(Commands::Split {
            file,
            out,
            max_bytes,
        }) => {
            let config = cli_config(&cli)?;
            run_split_command(&config, file, out.clone(), *max_bytes)?;
            Ok(())
        }
        Some(Commands::Merge { output, chunks }) => {
            let merged = merge_files(output, chunks)?;
            if !cli.quiet {
                println!(
                    "Merged {} chunk(s) into {} ({:.1}s, {} segments)",
                    chunks.len(),
                    output.display(),
                    merged.duration,
                    merged.segments.len()
                );
            }
            Ok(())
        }
        Some(Commands::Check) => {
            let config = cli_config(&cli)?;
            if !check_dependencies(&config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Commands::Config { action }) => handle_config_command(action, &cli),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "callsum", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn run_stages(config: &Config, stages: &[Stage], quiet: bool) -> Result<()> {
    if stages.contains(&Stage::Summarization) {
        config.validate_prompt()?;
    }
    let report = run_stages_command(config, stages, quiet)?;
    let failed = report.total_failed();
    if failed > 0 {
        eprintln!(
            "{}",
            format!("callsum: {failed} item(s) failed, see the log above").yellow()
        );
        std::process::exit(1);
    }
    Ok(())
}

/// Read an explicit env file, or `.env` from the working directory if present.
///
/// Variables already set in the environment win.
fn load_dotenv(file: Option<&Path>) -> Result<()> {
    match file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("cannot load env file {}", path.display()))?;
            tracing::debug!("loaded {}", path.display());
        }
        None => match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("loaded {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("ignoring .env: {e}"),
        },
    }
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/callsum/config.toml)
/// 3. Built-in defaults
///
/// Environment variables then command-line flags override the file.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

/// Effective configuration for this invocation, validated.
fn cli_config(cli: &Cli) -> Result<Config> {
    let mut config = load_config(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(dir) = &cli.data_dir {
        config.paths.data_dir = dir.clone();
    }
    if let Some(limit) = cli.limit {
        config.pipeline.limit = (limit > 0).then_some(limit);
    }
    if let Some(concurrency) = cli.concurrency {
        config.pipeline.concurrency = concurrency;
    }
    if cli.keep_going {
        config.pipeline.keep_going = true;
    }
}

/// Handle configuration commands.
fn handle_config_command(action: &ConfigAction, cli: &Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = cli_config(cli)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            std::fs::write(&config_path, Config::default().to_toml()?)
                .with_context(|| format!("cannot write {}", config_path.display()))?;
            println!("{}", format!("Wrote {}", config_path.display()).green());
        }
    }
    Ok(())
}
