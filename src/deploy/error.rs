// ABOUTME: Error types for deployment operations.
// ABOUTME: Separates fatal pre-backup failures from rollback-eligible ones.

use chrono::{DateTime, Utc};

use crate::backup::BackupError;
use crate::runtime::{ProvisionError, SourceError};

/// Errors that can occur while driving a deployment.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// An environment check failed before anything was touched.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Another deployment holds the lock for this project.
    #[error(
        "deployment already in progress (held by {holder}, pid {pid}, since {started_at}); use --break-lock to override"
    )]
    ConcurrentDeployment {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    /// Lock file could not be created or inspected.
    #[error("deploy lock error: {0}")]
    Lock(String),

    /// The checkpoint could not be taken; nothing to roll back to.
    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("source sync failed: {0}")]
    Sync(#[source] SourceError),

    #[error("service update failed: {0}")]
    Update(#[source] ProvisionError),

    #[error("health check failed: {0}")]
    HealthCheck(String),
}

/// Error categories for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Precondition,
    ConcurrentDeployment,
    Lock,
    Backup,
    Sync,
    Update,
    HealthCheck,
}

/// Who holds a contested deploy lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolderInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl DeployError {
    pub fn precondition(message: impl Into<String>) -> Self {
        DeployError::Precondition(message.into())
    }

    pub fn lock_error(message: impl Into<String>) -> Self {
        DeployError::Lock(message.into())
    }

    pub fn health_check(message: impl Into<String>) -> Self {
        DeployError::HealthCheck(message.into())
    }

    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Precondition(_) => DeployErrorKind::Precondition,
            DeployError::ConcurrentDeployment { .. } => DeployErrorKind::ConcurrentDeployment,
            DeployError::Lock(_) => DeployErrorKind::Lock,
            DeployError::Backup(_) => DeployErrorKind::Backup,
            DeployError::Sync(_) => DeployErrorKind::Sync,
            DeployError::Update(_) => DeployErrorKind::Update,
            DeployError::HealthCheck(_) => DeployErrorKind::HealthCheck,
        }
    }

    /// Failures after a successful backup are undone by restoring it.
    pub fn is_rollback_eligible(&self) -> bool {
        matches!(
            self.kind(),
            DeployErrorKind::Sync | DeployErrorKind::Update | DeployErrorKind::HealthCheck
        )
    }

    pub fn lock_holder_info(&self) -> Option<LockHolderInfo> {
        match self {
            DeployError::ConcurrentDeployment {
                holder,
                pid,
                started_at,
            } => Some(LockHolderInfo {
                holder: holder.clone(),
                pid: *pid,
                started_at: *started_at,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_post_backup_failures_are_rollback_eligible() {
        assert!(DeployError::Sync(SourceError::RemoteUnreachable("x".into())).is_rollback_eligible());
        assert!(DeployError::Update(ProvisionError::PullFailed("x".into())).is_rollback_eligible());
        assert!(DeployError::health_check("x").is_rollback_eligible());

        assert!(!DeployError::precondition("x").is_rollback_eligible());
        assert!(!DeployError::lock_error("x").is_rollback_eligible());
        assert!(!DeployError::Backup(BackupError::NoSnapshots).is_rollback_eligible());
    }

    #[test]
    fn lock_holder_info_only_for_concurrent_deployments() {
        let started_at = Utc::now();
        let err = DeployError::ConcurrentDeployment {
            holder: "ci-runner".into(),
            pid: 42,
            started_at,
        };
        let info = err.lock_holder_info().unwrap();
        assert_eq!(info.holder, "ci-runner");
        assert_eq!(info.pid, 42);
        assert_eq!(err.kind(), DeployErrorKind::ConcurrentDeployment);

        assert!(DeployError::precondition("x").lock_holder_info().is_none());
    }
}
