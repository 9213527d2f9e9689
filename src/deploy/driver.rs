// ABOUTME: Deployment driver: sequences backup, sync, update, probe, and rollback.
// ABOUTME: The single place that decides between commit, no-op, and rollback.

use crate::backup::{BackupManager, Snapshot};
use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::output::Output;
use crate::runtime::{Database, HttpProbe, Provisioner, SourceControl};

use super::attempt::DeploymentAttempt;
use super::deployment::Deployment;
use super::error::DeployError;
use super::preflight::Preflight;
use super::probe::{HealthProber, verification_targets};
use super::rollback::{RollbackController, RollbackReport};
use super::state::Recoverable;
use super::sync::SourceSynchronizer;
use super::update::ServiceUpdater;

/// Exit code for a committed or no-op run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for a fatal abort before the backup.
pub const EXIT_FATAL: i32 = 1;
/// Exit code for a run that was rolled back.
pub const EXIT_ROLLED_BACK: i32 = 2;

/// External collaborators a run talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub provisioner: &'a dyn Provisioner,
    pub source: &'a dyn SourceControl,
    pub database: Option<&'a dyn Database>,
    pub http: &'a dyn HttpProbe,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Update even when the source did not change.
    pub force: bool,
    /// Leave the working tree alone; implies an update.
    pub skip_sync: bool,
    /// Allow deploying when the primary service is not running.
    pub allow_cold_start: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Committed,
    Noop,
    RolledBack,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Committed => "COMMITTED",
            Verdict::Noop => "NOOP",
            Verdict::RolledBack => "ROLLED_BACK",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Committed | Verdict::Noop => EXIT_SUCCESS,
            Verdict::RolledBack => EXIT_ROLLED_BACK,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a run that got past the backup.
#[derive(Debug)]
pub struct DeploymentReport {
    pub verdict: Verdict,
    pub attempt: DeploymentAttempt,
    /// Snapshot taken at the start of this run.
    pub snapshot: Snapshot,
    pub image_changed: Option<bool>,
    /// Failure that triggered the rollback.
    pub cause: Option<DeployError>,
    pub rollback: Option<RollbackReport>,
}

impl DeploymentReport {
    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }
}

pub struct DeploymentDriver<'a> {
    config: &'a Config,
    collaborators: Collaborators<'a>,
    backups: BackupManager,
}

impl<'a> DeploymentDriver<'a> {
    pub fn new(config: &'a Config, collaborators: Collaborators<'a>) -> Self {
        Self {
            config,
            collaborators,
            backups: BackupManager::from_config(config),
        }
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    fn updater(&self) -> ServiceUpdater<'a> {
        ServiceUpdater::new(self.config, self.collaborators.provisioner)
    }

    fn prober(&self) -> HealthProber<'a> {
        HealthProber::new(self.collaborators.provisioner, self.collaborators.http)
    }

    /// Run one attempt. Callers must hold the deploy lock.
    ///
    /// # Errors
    ///
    /// Only failures before a snapshot exists are returned as errors; every
    /// later failure is rolled back and reported with `Verdict::RolledBack`.
    pub async fn run(
        &self,
        opts: DeployOptions,
        diag: &mut Diagnostics,
        output: &Output,
    ) -> Result<DeploymentReport, DeployError> {
        let c = self.collaborators;

        let revision = Preflight::new(self.config, c.provisioner, c.source, c.database)
            .check(opts.allow_cold_start)
            .await
            .inspect_err(|e| output.step("preflight", &format!("failed: {}", e)))?;
        output.step("preflight", &format!("ok (at {})", revision.short()));

        let deployment = Deployment::new(revision)
            .backup(&self.backups, c.source, c.database, diag)
            .await
            .inspect_err(|e| output.step("backup", &format!("failed: {}", e)))?;
        output.step("backup", &format!("ok (snapshot {})", deployment.snapshot().id));

        match self.backups.prune(self.config.backups.retain) {
            Ok(removed) if !removed.is_empty() => {
                output.step("prune", &format!("removed {}", removed.len()))
            }
            Ok(_) => {}
            Err(e) => diag.warn(Warning::prune(format!("snapshot pruning failed: {}", e))),
        }

        let synced = if opts.skip_sync {
            output.step("sync", "skipped");
            deployment.skip_sync()
        } else {
            match deployment
                .sync(&SourceSynchronizer::new(c.source), &self.config.branch)
                .await
            {
                Ok(d) => {
                    let sync = d.sync_outcome();
                    let outcome = if sync.changed {
                        format!("changed ({} -> {})", sync.before.short(), sync.after.short())
                    } else {
                        format!("unchanged ({})", sync.after.short())
                    };
                    output.step("sync", &outcome);
                    d
                }
                Err((d, e)) => return Ok(self.roll_back(d, "sync", e, diag, output).await),
            }
        };

        if !synced.needs_update(opts.force) {
            output.step("update", "skipped (no changes)");
            let snapshot = synced.snapshot().clone();
            let attempt = synced.finish_noop().finish();
            return Ok(DeploymentReport {
                verdict: Verdict::Noop,
                attempt,
                snapshot,
                image_changed: None,
                cause: None,
                rollback: None,
            });
        }

        let updated = match synced.update(&self.updater()).await {
            Ok(d) => {
                let image_changed = d.update_outcome().image_changed;
                output.step(
                    "update",
                    if image_changed {
                        "ok (image changed)"
                    } else {
                        "ok (image unchanged)"
                    },
                );
                d
            }
            Err((d, e)) => return Ok(self.roll_back(d, "update", e, diag, output).await),
        };

        let targets = verification_targets(self.config);
        let committed = match updated.verify(&self.prober(), &targets).await {
            Ok(d) => {
                output.step("probe", &format!("ok ({} targets healthy)", targets.len()));
                d
            }
            Err((d, e)) => return Ok(self.roll_back(d, "probe", e, diag, output).await),
        };

        let snapshot = committed.committed_snapshot().clone();
        let image_changed = committed.update_outcome().image_changed;
        Ok(DeploymentReport {
            verdict: Verdict::Committed,
            attempt: committed.finish(),
            snapshot,
            image_changed: Some(image_changed),
            cause: None,
            rollback: None,
        })
    }

    async fn roll_back<S: Recoverable>(
        &self,
        deployment: Deployment<S>,
        step: &str,
        cause: DeployError,
        diag: &mut Diagnostics,
        output: &Output,
    ) -> DeploymentReport {
        output.step(step, &format!("failed: {}", cause));
        tracing::error!(step, error = %cause, "step failed, rolling back");

        let controller = RollbackController::new(
            self.config,
            &self.backups,
            self.collaborators.source,
            self.updater(),
            self.prober(),
        );
        let rolled_back = deployment.rollback(&controller, diag).await;

        let report = rolled_back.rollback_report().clone();
        output.step(
            "rollback",
            if report.healthy_after {
                "restored (healthy)"
            } else {
                "restored (not healthy, see warnings)"
            },
        );

        let snapshot = rolled_back.restored_snapshot().clone();
        DeploymentReport {
            verdict: Verdict::RolledBack,
            attempt: rolled_back.finish(),
            snapshot,
            image_changed: None,
            cause: Some(cause),
            rollback: Some(report),
        }
    }
}
