// ABOUTME: Backups command implementation.
// ABOUTME: Lists snapshots and prunes old ones under the deploy lock.

use horsestrap::backup::BackupManager;
use horsestrap::config::Config;
use horsestrap::deploy::{DeployLock, EXIT_FATAL, EXIT_SUCCESS};
use horsestrap::diagnostics::{Diagnostics, Warning};
use horsestrap::error::Result;
use horsestrap::output::{Output, OutputMode};
use serde::Serialize;

#[derive(Serialize)]
struct SnapshotEntry {
    id: String,
    seq: u64,
    created_at: String,
    revision: String,
    config_files: usize,
    database_dump: Option<String>,
}

pub fn list_backups(config: &Config, output: &Output) -> Result<i32> {
    let backups = BackupManager::from_config(config);
    let snapshots = backups.snapshots()?;

    if output.mode() == OutputMode::Json {
        for s in snapshots.iter().rev() {
            let entry = SnapshotEntry {
                id: s.id.to_string(),
                seq: s.seq,
                created_at: s.created_at.to_rfc3339(),
                revision: s.revision.to_string(),
                config_files: s.config_files.len(),
                database_dump: backups.dump_path(s).map(|p| p.display().to_string()),
            };
            if let Ok(json) = serde_json::to_string(&entry) {
                println!("{json}");
            }
        }
        return Ok(EXIT_SUCCESS);
    }

    if snapshots.is_empty() {
        output.success(&format!("No snapshots in {}", backups.root().display()));
        return Ok(EXIT_SUCCESS);
    }

    for s in snapshots.iter().rev() {
        println!(
            "{}  {}  {}  {} config file(s){}",
            s.id,
            s.created_at.format("%Y-%m-%d %H:%M:%S"),
            s.revision.short(),
            s.config_files.len(),
            if s.database_dump.is_some() { ", db dump" } else { "" }
        );
    }
    Ok(EXIT_SUCCESS)
}

pub fn prune_backups(config: &Config, retain: Option<usize>, output: &Output) -> Result<i32> {
    let retain = retain.unwrap_or(config.backups.retain);
    if retain == 0 {
        output.error("--retain must be at least 1");
        return Ok(EXIT_FATAL);
    }

    let mut diag = Diagnostics::default();
    let lock = DeployLock::acquire(
        &config.lock_path(),
        &config.project_dir,
        config.lock.stale_after,
        false,
        &mut diag,
    )?;

    let result = BackupManager::from_config(config).prune(retain);
    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(e.to_string()));
    }
    output.warnings(&diag);

    let removed = result?;
    output.success(&format!(
        "Removed {} snapshot(s), kept at most {}",
        removed.len(),
        retain
    ));
    Ok(EXIT_SUCCESS)
}
