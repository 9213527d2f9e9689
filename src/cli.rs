// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "horsestrap")]
#[command(about = "Checkpointed Docker Compose deployments with automatic rollback")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Config file (overrides discovery in the project directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a horsestrap.yml template
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Snapshot, sync, update, and verify; roll back on failure
    Deploy {
        /// Update services even when the source did not change
        #[arg(long)]
        force: bool,

        /// Do not fetch or pull; redeploy the current tree
        #[arg(long)]
        skip_sync: bool,

        /// Break an active deploy lock held by another process
        #[arg(long)]
        break_lock: bool,

        /// Allow deploying when the primary service is not running
        #[arg(long)]
        allow_cold_start: bool,
    },

    /// Restore the latest snapshot, discard it, and restart all services
    Rollback {
        /// Break an active deploy lock held by another process
        #[arg(long)]
        break_lock: bool,
    },

    /// Show revision, snapshots, and service health
    Status,

    /// Inspect or prune snapshots
    Backups {
        #[command(subcommand)]
        command: BackupsCommand,
    },
}

#[derive(Subcommand)]
pub enum BackupsCommand {
    /// List snapshots, newest first
    List,

    /// Delete all but the newest snapshots
    Prune {
        /// Snapshots to keep (defaults to backups.retain)
        #[arg(long)]
        retain: Option<usize>,
    },
}
