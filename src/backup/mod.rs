// ABOUTME: Backup manager: snapshots recoverable state before any mutation.
// ABOUTME: Captures revision, config file copies, and a database dump; restores and prunes.

mod error;
mod index;

pub use error::BackupError;
pub use index::{INDEX_FILENAME, IndexEntry, SnapshotIndex};

use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::{Database, SourceControl};
use crate::types::{Revision, SnapshotId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REVISION_FILENAME: &str = "REVISION";
pub const CONFIG_DIRNAME: &str = "config";
pub const DUMP_FILENAME: &str = "database.sql";
pub const METADATA_FILENAME: &str = "snapshot.json";

/// Recoverable state captured before a deployment mutates anything.
///
/// Immutable once written. Deleted only by pruning or by an explicit
/// restore-and-discard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub revision: Revision,
    /// Project-relative paths of the config files actually copied.
    pub config_files: Vec<PathBuf>,
    /// Dump file name inside the snapshot directory, when the dump succeeded.
    pub database_dump: Option<PathBuf>,
}

/// Owns the snapshot history under the backups directory.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    project_dir: PathBuf,
    config_files: Vec<PathBuf>,
}

impl BackupManager {
    pub fn new(
        root: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
        config_files: Vec<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            project_dir: project_dir.into(),
            config_files,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.backups_dir(),
            config.project_dir.clone(),
            config.config_files.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_dir(&self, id: &SnapshotId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Path of the database dump for `snapshot`, if one was taken.
    pub fn dump_path(&self, snapshot: &Snapshot) -> Option<PathBuf> {
        snapshot
            .database_dump
            .as_ref()
            .map(|name| self.snapshot_dir(&snapshot.id).join(name))
    }

    /// Capture the current revision, config files, and database.
    ///
    /// A failed dump or a missing config file is recorded as a warning and
    /// the snapshot is still committed. The index is written last, so a
    /// snapshot only exists once it is complete.
    pub async fn create_snapshot(
        &self,
        source: &dyn SourceControl,
        database: Option<&dyn Database>,
        diag: &mut Diagnostics,
    ) -> Result<Snapshot, BackupError> {
        let revision = source.current_revision().await?;

        std::fs::create_dir_all(&self.root).map_err(BackupError::io(&self.root))?;
        let mut index = SnapshotIndex::load(&self.root)?;
        let mut entry = index.next_entry(Utc::now());
        while self.snapshot_dir(&entry.id).exists() {
            // Leftover directory from an interrupted run.
            entry = index.next_entry(entry.created_at + Duration::milliseconds(1));
        }

        let dir = self.snapshot_dir(&entry.id);
        std::fs::create_dir_all(&dir).map_err(BackupError::io(&dir))?;

        let revision_path = dir.join(REVISION_FILENAME);
        std::fs::write(&revision_path, format!("{}\n", revision))
            .map_err(BackupError::io(&revision_path))?;

        let config_files = self.copy_config_files(&dir.join(CONFIG_DIRNAME), diag)?;

        let database_dump = match database {
            Some(db) => {
                let dump_path = dir.join(DUMP_FILENAME);
                match db.backup_to(&dump_path).await {
                    Ok(()) => Some(PathBuf::from(DUMP_FILENAME)),
                    Err(e) => {
                        let _ = std::fs::remove_file(&dump_path);
                        diag.warn(Warning::database_dump(format!(
                            "database dump failed, snapshot {} has no dump: {}",
                            entry.id, e
                        )));
                        None
                    }
                }
            }
            None => None,
        };

        let snapshot = Snapshot {
            id: entry.id.clone(),
            seq: entry.seq,
            created_at: entry.created_at,
            revision,
            config_files,
            database_dump,
        };

        let metadata_path = dir.join(METADATA_FILENAME);
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(BackupError::metadata(&metadata_path))?;
        std::fs::write(&metadata_path, json).map_err(BackupError::io(&metadata_path))?;

        index.push(entry);
        index.save(&self.root)?;

        tracing::info!(
            snapshot = %snapshot.id,
            revision = %snapshot.revision.short(),
            dump = snapshot.database_dump.is_some(),
            "snapshot created"
        );
        Ok(snapshot)
    }

    fn copy_config_files(
        &self,
        target: &Path,
        diag: &mut Diagnostics,
    ) -> Result<Vec<PathBuf>, BackupError> {
        std::fs::create_dir_all(target).map_err(BackupError::io(target))?;

        let mut copied = Vec::new();
        for rel in &self.config_files {
            let from = self.project_dir.join(rel);
            let to = target.join(rel);
            match copy_file(&from, &to) {
                Ok(()) => copied.push(rel.clone()),
                Err(e) => diag.warn(Warning::config_file(format!(
                    "config file {} not captured: {}",
                    rel.display(),
                    e
                ))),
            }
        }
        Ok(copied)
    }

    pub fn load_snapshot(&self, id: &SnapshotId) -> Result<Snapshot, BackupError> {
        let path = self.snapshot_dir(id).join(METADATA_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackupError::NotFound(id.clone()));
            }
            Err(e) => return Err(BackupError::io(&path)(e)),
        };
        serde_json::from_str(&content).map_err(BackupError::metadata(&path))
    }

    /// All snapshots in creation order, oldest first.
    pub fn snapshots(&self) -> Result<Vec<Snapshot>, BackupError> {
        let index = SnapshotIndex::load(&self.root)?;
        let mut entries = index.entries().to_vec();
        entries.sort_by_key(|e| e.seq);
        entries.iter().map(|e| self.load_snapshot(&e.id)).collect()
    }

    pub fn latest(&self) -> Result<Option<Snapshot>, BackupError> {
        let index = SnapshotIndex::load(&self.root)?;
        index
            .entries()
            .iter()
            .max_by_key(|e| e.seq)
            .map(|e| self.load_snapshot(&e.id))
            .transpose()
    }

    /// Put back the config files and revision pointer of the latest snapshot.
    ///
    /// Fails only when there is nothing to restore; individual restore steps
    /// that fail are recorded as warnings. The database dump is left in place
    /// for the operator.
    pub async fn restore_latest(
        &self,
        source: &dyn SourceControl,
        diag: &mut Diagnostics,
    ) -> Result<Snapshot, BackupError> {
        let snapshot = self.latest()?.ok_or(BackupError::NoSnapshots)?;
        let config_dir = self.snapshot_dir(&snapshot.id).join(CONFIG_DIRNAME);

        // Reset first so the captured config copies win over tracked versions.
        if let Err(e) = source.reset_hard(&snapshot.revision).await {
            diag.warn(Warning::rollback(format!(
                "failed to reset working tree to {}: {}",
                snapshot.revision.short(),
                e
            )));
        }

        for rel in &snapshot.config_files {
            if let Err(e) = copy_file(&config_dir.join(rel), &self.project_dir.join(rel)) {
                diag.warn(Warning::rollback(format!(
                    "failed to restore {}: {}",
                    rel.display(),
                    e
                )));
            }
        }

        if let Some(dump) = self.dump_path(&snapshot) {
            tracing::info!(dump = %dump.display(), "database dump kept for manual restore");
        }

        tracing::info!(snapshot = %snapshot.id, revision = %snapshot.revision.short(), "snapshot restored");
        Ok(snapshot)
    }

    /// Remove one snapshot from the history and delete its files.
    pub fn discard(&self, id: &SnapshotId) -> Result<(), BackupError> {
        let mut index = SnapshotIndex::load(&self.root)?;
        if index.remove(id).is_none() {
            return Err(BackupError::NotFound(id.clone()));
        }
        index.save(&self.root)?;

        let dir = self.snapshot_dir(id);
        std::fs::remove_dir_all(&dir).map_err(BackupError::io(&dir))?;
        tracing::debug!(snapshot = %id, "snapshot discarded");
        Ok(())
    }

    /// Keep the `retain` most recently created snapshots, delete the rest.
    ///
    /// Returns the ids removed from the history.
    pub fn prune(&self, retain: usize) -> Result<Vec<SnapshotId>, BackupError> {
        let mut index = SnapshotIndex::load(&self.root)?;
        let dropped = index.split_off_oldest(retain);
        if dropped.is_empty() {
            return Ok(Vec::new());
        }
        index.save(&self.root)?;

        let mut removed = Vec::with_capacity(dropped.len());
        for entry in dropped {
            let dir = self.snapshot_dir(&entry.id);
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(dir = %dir.display(), "failed to delete pruned snapshot: {}", e);
                }
            }
            removed.push(entry.id);
        }

        tracing::info!(removed = removed.len(), retain, "snapshots pruned");
        Ok(removed)
    }
}

fn copy_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to).map(|_| ())
}
