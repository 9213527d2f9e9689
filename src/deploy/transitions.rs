// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use crate::backup::BackupManager;
use crate::config::ProbeBudget;
use crate::diagnostics::Diagnostics;
use crate::runtime::{Database, SourceControl};

use super::Deployment;
use super::attempt::Outcome;
use super::error::DeployError;
use super::probe::{HealthProber, ProbeTarget};
use super::rollback::RollbackController;
use super::state::{
    BackedUp, Committed, Initialized, Noop, Recoverable, RolledBack, Synced, Updated,
};
use super::sync::{SourceSynchronizer, SyncOutcome};
use super::update::ServiceUpdater;

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            attempt: self.attempt,
            state,
        }
    }
}

// =============================================================================
// Initialized -> BackedUp
// =============================================================================

impl Deployment<Initialized> {
    /// Take the checkpoint every later step can fall back to.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Backup` if the snapshot cannot be written. The
    /// deployment stays `Initialized`; there is nothing to roll back.
    #[must_use = "deployment state must be used"]
    pub async fn backup(
        mut self,
        backups: &BackupManager,
        source: &dyn SourceControl,
        database: Option<&dyn Database>,
        diag: &mut Diagnostics,
    ) -> Result<Deployment<BackedUp>, DeployError> {
        match backups.create_snapshot(source, database, diag).await {
            Ok(snapshot) => Ok(self.transition(BackedUp { snapshot })),
            Err(e) => {
                self.attempt.conclude(Outcome::Failed);
                Err(DeployError::Backup(e))
            }
        }
    }
}

// =============================================================================
// BackedUp -> Synced
// =============================================================================

impl Deployment<BackedUp> {
    /// Bring the working tree to the upstream head of `branch`.
    #[must_use = "deployment state must be used"]
    pub async fn sync(
        mut self,
        synchronizer: &SourceSynchronizer<'_>,
        branch: &str,
    ) -> TransitionResult<Synced, BackedUp> {
        match synchronizer.sync(branch).await {
            Ok(sync) => {
                self.attempt.revision_after = Some(sync.after.clone());
                let snapshot = self.state.snapshot;
                Ok(Deployment {
                    attempt: self.attempt,
                    state: Synced { snapshot, sync },
                })
            }
            Err(e) => Err((self, DeployError::Sync(e))),
        }
    }

    /// Continue without touching the working tree.
    #[must_use = "deployment state must be used"]
    pub fn skip_sync(mut self) -> Deployment<Synced> {
        let current = self.attempt.revision_before.clone();
        self.attempt.revision_after = Some(current.clone());
        let snapshot = self.state.snapshot;
        Deployment {
            attempt: self.attempt,
            state: Synced {
                snapshot,
                sync: SyncOutcome::skipped(current),
            },
        }
    }
}

// =============================================================================
// Synced -> Updated | Noop
// =============================================================================

impl Deployment<Synced> {
    /// An update runs when the source changed or it was forced.
    pub fn needs_update(&self, force: bool) -> bool {
        force || self.state.sync.changed
    }

    /// End successfully without touching any container.
    #[must_use = "deployment state must be used"]
    pub fn finish_noop(mut self) -> Deployment<Noop> {
        self.attempt.conclude(Outcome::Succeeded);
        let snapshot = self.state.snapshot;
        Deployment {
            attempt: self.attempt,
            state: Noop { snapshot },
        }
    }

    /// Pull images and recreate the application services.
    #[must_use = "deployment state must be used"]
    pub async fn update(self, updater: &ServiceUpdater<'_>) -> TransitionResult<Updated, Synced> {
        match updater.apply().await {
            Ok(update) => {
                let Synced { snapshot, sync } = self.state;
                Ok(Deployment {
                    attempt: self.attempt,
                    state: Updated {
                        snapshot,
                        sync,
                        update,
                    },
                })
            }
            Err(e) => Err((self, DeployError::Update(e))),
        }
    }
}

// =============================================================================
// Updated -> Committed
// =============================================================================

impl Deployment<Updated> {
    /// Probe every target; commit when all pass.
    #[must_use = "deployment state must be used"]
    pub async fn verify(
        mut self,
        prober: &HealthProber<'_>,
        targets: &[(ProbeTarget, ProbeBudget)],
    ) -> TransitionResult<Committed, Updated> {
        match prober.probe_all(targets).await {
            Ok(()) => {
                self.attempt.conclude(Outcome::Succeeded);
                let Updated {
                    snapshot, update, ..
                } = self.state;
                Ok(Deployment {
                    attempt: self.attempt,
                    state: Committed { snapshot, update },
                })
            }
            Err(target) => Err((
                self,
                DeployError::health_check(format!("{} did not become healthy", target)),
            )),
        }
    }
}

// =============================================================================
// Any post-backup state -> RolledBack
// =============================================================================

impl<S: Recoverable> Deployment<S> {
    /// Restore the latest snapshot. Always reaches `RolledBack`.
    #[must_use = "deployment state must be used"]
    pub async fn rollback(
        mut self,
        controller: &RollbackController<'_>,
        diag: &mut Diagnostics,
    ) -> Deployment<RolledBack> {
        let report = controller.rollback(diag).await;
        self.attempt.conclude(Outcome::RolledBack);
        let snapshot = self.state.snapshot().clone();
        self.transition(RolledBack { snapshot, report })
    }
}

// =============================================================================
// Terminal
// =============================================================================

impl Deployment<Committed> {
    pub fn finish(self) -> super::DeploymentAttempt {
        self.attempt
    }
}

impl Deployment<Noop> {
    pub fn finish(self) -> super::DeploymentAttempt {
        self.attempt
    }
}

impl Deployment<RolledBack> {
    pub fn finish(self) -> super::DeploymentAttempt {
        self.attempt
    }
}
