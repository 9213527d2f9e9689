// ABOUTME: Git-backed source control for the deployed working tree.
// ABOUTME: Wraps rev-parse, fetch, pull, status, stash, and reset subprocesses.

use super::command::HostCommand;
use super::error::{CommandError, CommandErrorKind};
use super::traits::{SourceControl, SourceError};
use crate::types::Revision;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Source control over a local git checkout.
#[derive(Debug, Clone)]
pub struct GitSource {
    work_tree: PathBuf,
    remote: String,
    timeout: Duration,
}

impl GitSource {
    pub fn new(work_tree: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            work_tree: work_tree.into(),
            remote: remote.into(),
            timeout: super::command::DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn git(&self) -> HostCommand {
        HostCommand::new("git")
            .arg("-C")
            .arg(self.work_tree.to_string_lossy())
            .timeout(self.timeout)
    }
}

fn operation_failed(e: CommandError) -> SourceError {
    SourceError::OperationFailed(e.to_string())
}

/// Remote operations that fail to run at all, time out, or exit non-zero
/// all mean the remote could not be reached from here.
fn remote_unreachable(e: CommandError) -> SourceError {
    match e.kind() {
        CommandErrorKind::NotRunnable => SourceError::Unavailable(e.to_string()),
        _ => SourceError::RemoteUnreachable(e.to_string()),
    }
}

#[async_trait]
impl SourceControl for GitSource {
    async fn check_available(&self) -> Result<(), SourceError> {
        self.git()
            .args(["rev-parse", "--is-inside-work-tree"])
            .run()
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn current_revision(&self) -> Result<Revision, SourceError> {
        let output = self
            .git()
            .args(["rev-parse", "HEAD"])
            .run()
            .await
            .map_err(operation_failed)?;
        Ok(Revision::new(output.stdout.trim()))
    }

    async fn fetch(&self) -> Result<(), SourceError> {
        self.git()
            .args(["fetch", "--prune"])
            .arg(&self.remote)
            .run()
            .await
            .map_err(remote_unreachable)?;
        Ok(())
    }

    async fn pull(&self, branch: &str) -> Result<Revision, SourceError> {
        self.git()
            .args(["pull", "--ff-only"])
            .arg(&self.remote)
            .arg(branch)
            .run()
            .await
            .map_err(remote_unreachable)?;
        self.current_revision().await
    }

    async fn has_uncommitted_changes(&self) -> Result<bool, SourceError> {
        let output = self
            .git()
            .args(["status", "--porcelain", "--untracked-files=no"])
            .run()
            .await
            .map_err(operation_failed)?;
        Ok(!output.stdout.trim().is_empty())
    }

    async fn stash(&self, label: &str) -> Result<(), SourceError> {
        self.git()
            .args(["stash", "push", "-m", label])
            .run()
            .await
            .map_err(operation_failed)?;
        Ok(())
    }

    async fn reset_hard(&self, revision: &Revision) -> Result<(), SourceError> {
        self.git()
            .args(["reset", "--hard", revision.as_str()])
            .run()
            .await
            .map_err(operation_failed)?;
        Ok(())
    }
}
