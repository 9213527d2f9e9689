// ABOUTME: Entry point for the horsestrap CLI application.
// ABOUTME: Parses arguments, loads config, and maps outcomes to exit codes.

mod cli;
mod commands;

use clap::Parser;
use cli::{BackupsCommand, Cli, Commands};
use horsestrap::config::{self, Config};
use horsestrap::deploy::{DeployOptions, EXIT_FATAL, EXIT_SUCCESS};
use horsestrap::error::Result;
use horsestrap::output::{Output, OutputMode};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);

    let code = match run(cli, &mut output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, output: &mut Output) -> Result<i32> {
    let project_dir = match cli.project_dir {
        Some(ref dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { force } => {
            let path = config::init_config(&project_dir, force)?;
            output.success(&format!("Created {}", path.display()));
            Ok(EXIT_SUCCESS)
        }
        Commands::Deploy {
            force,
            skip_sync,
            break_lock,
            allow_cold_start,
        } => {
            let config = load_config(&project_dir, cli.project_dir.is_some(), cli.config)?;
            let opts = DeployOptions {
                force,
                skip_sync,
                allow_cold_start,
            };
            commands::deploy(&config, opts, break_lock, output).await
        }
        Commands::Rollback { break_lock } => {
            let config = load_config(&project_dir, cli.project_dir.is_some(), cli.config)?;
            commands::rollback(&config, break_lock, output).await
        }
        Commands::Status => {
            let config = load_config(&project_dir, cli.project_dir.is_some(), cli.config)?;
            commands::status(&config, output).await
        }
        Commands::Backups { command } => {
            let config = load_config(&project_dir, cli.project_dir.is_some(), cli.config)?;
            match command {
                BackupsCommand::List => commands::list_backups(&config, output),
                BackupsCommand::Prune { retain } => {
                    commands::prune_backups(&config, retain, output)
                }
            }
        }
    }
}

/// Explicit `--config` wins over discovery; an explicit `--project-dir`
/// wins over the config file's location.
fn load_config(
    project_dir: &Path,
    explicit_dir: bool,
    config_path: Option<PathBuf>,
) -> Result<Config> {
    match config_path {
        Some(path) => {
            let config = Config::load(&path)?;
            if explicit_dir {
                Ok(config.with_project_dir(project_dir))
            } else {
                Ok(config)
            }
        }
        None => Config::discover(project_dir),
    }
}
