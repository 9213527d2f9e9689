// ABOUTME: Source synchronizer: advances the working tree to the upstream revision.
// ABOUTME: Local modifications are stashed under a timestamped label, never discarded.

use chrono::Utc;

use crate::runtime::{SourceControl, SourceError};
use crate::types::Revision;

/// Result of a sync: where the tree was and where it is now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub changed: bool,
    pub before: Revision,
    pub after: Revision,
}

impl SyncOutcome {
    /// Outcome for a run that skipped syncing; treated as changed so the
    /// update still happens.
    pub fn skipped(current: Revision) -> Self {
        Self {
            changed: true,
            before: current.clone(),
            after: current,
        }
    }
}

pub struct SourceSynchronizer<'a> {
    source: &'a dyn SourceControl,
}

impl<'a> SourceSynchronizer<'a> {
    pub fn new(source: &'a dyn SourceControl) -> Self {
        Self { source }
    }

    /// Fetch and fast-forward `branch`.
    ///
    /// An unreachable remote is an error, never "no changes".
    pub async fn sync(&self, branch: &str) -> Result<SyncOutcome, SourceError> {
        let before = self.source.current_revision().await?;

        if self.source.has_uncommitted_changes().await? {
            let label = stash_label();
            tracing::warn!(%label, "stashing local modifications");
            self.source.stash(&label).await?;
        }

        self.source.fetch().await?;
        let after = self.source.pull(branch).await?;
        let changed = before != after;

        tracing::info!(
            before = %before.short(),
            after = %after.short(),
            changed,
            "source synced"
        );
        Ok(SyncOutcome {
            changed,
            before,
            after,
        })
    }
}

fn stash_label() -> String {
    format!("horsestrap-{}", Utc::now().format("%Y%m%dT%H%M%SZ"))
}
