// ABOUTME: Source control trait for the deployed working tree.
// ABOUTME: Revision queries, fetch/pull, stash, and hard reset.

use crate::types::Revision;
use async_trait::async_trait;

/// Operations on the working tree the stack is deployed from.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Verify the tool is installed and the working tree is a repository.
    async fn check_available(&self) -> Result<(), SourceError>;

    /// Revision currently checked out.
    async fn current_revision(&self) -> Result<Revision, SourceError>;

    /// Fetch from the configured remote.
    async fn fetch(&self) -> Result<(), SourceError>;

    /// Fast-forward the working tree to the remote branch, returning the new revision.
    async fn pull(&self, branch: &str) -> Result<Revision, SourceError>;

    /// Whether tracked files have local modifications.
    async fn has_uncommitted_changes(&self) -> Result<bool, SourceError>;

    /// Stash local modifications under the given label.
    async fn stash(&self, label: &str) -> Result<(), SourceError>;

    /// Reset the working tree to exactly the given revision.
    async fn reset_hard(&self, revision: &Revision) -> Result<(), SourceError>;
}

/// Errors from source control operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source control unavailable: {0}")]
    Unavailable(String),

    #[error("remote unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("source control operation failed: {0}")]
    OperationFailed(String),
}
