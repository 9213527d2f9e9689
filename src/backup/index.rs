// ABOUTME: Ordered snapshot index persisted as index.json in the backups directory.
// ABOUTME: Creation order lives here explicitly; directory listing order is never consulted.

use super::BackupError;
use crate::types::SnapshotId;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const INDEX_FILENAME: &str = "index.json";

const ID_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub seq: u64,
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotIndex {
    next_seq: u64,
    entries: Vec<IndexEntry>,
}

impl SnapshotIndex {
    pub fn path(root: &Path) -> PathBuf {
        root.join(INDEX_FILENAME)
    }

    /// Load the index; a missing file is an empty history.
    pub fn load(root: &Path) -> Result<Self, BackupError> {
        let path = Self::path(root);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(BackupError::io(&path)(e)),
        };
        serde_json::from_str(&content).map_err(BackupError::metadata(&path))
    }

    /// Persist via write-then-rename so a crash never leaves a torn index.
    pub fn save(&self, root: &Path) -> Result<(), BackupError> {
        let path = Self::path(root);
        let tmp = root.join(format!("{}.tmp", INDEX_FILENAME));
        let json = serde_json::to_string_pretty(self).map_err(BackupError::metadata(&path))?;
        std::fs::write(&tmp, json).map_err(BackupError::io(&tmp))?;
        std::fs::rename(&tmp, &path).map_err(BackupError::io(&path))
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&IndexEntry> {
        self.entries.last()
    }

    /// Reserve the next entry. Timestamps are bumped so every id is strictly
    /// later than the previous one even when the clock stalls or steps back.
    pub fn next_entry(&self, now: DateTime<Utc>) -> IndexEntry {
        let mut created_at = now.trunc_subsecs(3);
        if let Some(last) = self.latest() {
            if created_at <= last.created_at {
                created_at = last.created_at + Duration::milliseconds(1);
            }
        }
        IndexEntry {
            seq: self.next_seq,
            id: SnapshotId::new(created_at.format(ID_FORMAT).to_string()),
            created_at,
        }
    }

    pub fn push(&mut self, entry: IndexEntry) {
        self.next_seq = entry.seq + 1;
        self.entries.push(entry);
    }

    pub fn remove(&mut self, id: &SnapshotId) -> Option<IndexEntry> {
        let pos = self.entries.iter().position(|e| &e.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Drop all but the `retain` newest entries, returning the dropped ones.
    pub fn split_off_oldest(&mut self, retain: usize) -> Vec<IndexEntry> {
        self.entries.sort_by_key(|e| e.seq);
        let excess = self.entries.len().saturating_sub(retain);
        self.entries.drain(..excess).collect()
    }
}
