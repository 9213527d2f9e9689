// ABOUTME: Rollback controller: restores the latest snapshot after a failed step.
// ABOUTME: Every step is best-effort; failures become warnings and never escalate.

use crate::backup::{BackupManager, Snapshot};
use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::runtime::SourceControl;

use super::probe::{HealthProber, verification_targets};
use super::update::ServiceUpdater;

/// What a rollback managed to do.
#[derive(Debug, Clone)]
pub struct RollbackReport {
    /// Snapshot put back, if one could be restored.
    pub restored: Option<Snapshot>,
    pub restarted: bool,
    /// Post-rollback probe result; informational only.
    pub healthy_after: bool,
}

pub struct RollbackController<'a> {
    config: &'a Config,
    backups: &'a BackupManager,
    source: &'a dyn SourceControl,
    updater: ServiceUpdater<'a>,
    prober: HealthProber<'a>,
}

impl<'a> RollbackController<'a> {
    pub fn new(
        config: &'a Config,
        backups: &'a BackupManager,
        source: &'a dyn SourceControl,
        updater: ServiceUpdater<'a>,
        prober: HealthProber<'a>,
    ) -> Self {
        Self {
            config,
            backups,
            source,
            updater,
            prober,
        }
    }

    /// Stop, restore, restart, probe. Never fails.
    pub async fn rollback(&self, diag: &mut Diagnostics) -> RollbackReport {
        if let Err(e) = self.updater.stop_app_services().await {
            diag.warn(Warning::rollback(format!(
                "failed to stop application services: {}",
                e
            )));
        }

        let restored = match self.backups.restore_latest(self.source, diag).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                diag.warn(Warning::rollback(format!("failed to restore snapshot: {}", e)));
                None
            }
        };

        let restart = self.updater.clean_restart().await;
        if let Err(ref e) = restart.stop {
            diag.warn(Warning::rollback(format!("failed to stop all services: {}", e)));
        }
        if let Err(ref e) = restart.start {
            diag.warn(Warning::rollback(format!("failed to start all services: {}", e)));
        }
        let restarted = restart.started();

        let targets: Vec<_> = verification_targets(self.config)
            .into_iter()
            .map(|(target, _)| (target, self.config.rollback_probe))
            .collect();
        let healthy_after = match self.prober.probe_all(&targets).await {
            Ok(()) => true,
            Err(target) => {
                diag.warn(Warning::rollback(format!(
                    "{} not healthy after rollback",
                    target
                )));
                false
            }
        };

        tracing::info!(
            restored = restored.as_ref().map(|s| s.id.as_str()).unwrap_or("-"),
            restarted,
            healthy_after,
            "rollback finished"
        );
        RollbackReport {
            restored,
            restarted,
            healthy_after,
        }
    }
}
