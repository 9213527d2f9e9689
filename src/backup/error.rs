// ABOUTME: Error types for snapshot creation, restore, and pruning.
// ABOUTME: Only a missing snapshot fails a restore; other restore problems are warnings.

use crate::runtime::SourceError;
use crate::types::SnapshotId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("no snapshot available to restore")]
    NoSnapshots,

    #[error("snapshot {0} not found")]
    NotFound(SnapshotId),

    #[error("failed to read current revision: {0}")]
    Revision(#[from] SourceError),

    #[error("backup I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt backup metadata at {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl BackupError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| BackupError::Io { path, source }
    }

    pub(crate) fn metadata(path: impl Into<PathBuf>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.into();
        move |source| BackupError::Metadata { path, source }
    }
}
