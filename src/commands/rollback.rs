// ABOUTME: Rollback command implementation.
// ABOUTME: Restores and discards the latest snapshot, then restarts every service.

use super::environment::Environment;
use horsestrap::backup::BackupManager;
use horsestrap::config::Config;
use horsestrap::deploy::{
    DeployLock, EXIT_FATAL, EXIT_SUCCESS, HealthProber, RollbackController, ServiceUpdater,
};
use horsestrap::diagnostics::{Diagnostics, Warning};
use horsestrap::error::Result;
use horsestrap::output::Output;

/// Manually roll back to the latest snapshot, returning the exit code.
pub async fn rollback(config: &Config, break_lock: bool, output: &mut Output) -> Result<i32> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let lock = DeployLock::acquire(
        &config.lock_path(),
        &config.project_dir,
        config.lock.stale_after,
        break_lock,
        &mut diag,
    )?;
    let result = rollback_locked(config, output, &mut diag).await;
    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(e.to_string()));
    }

    output.warnings(&diag);
    result
}

async fn rollback_locked(
    config: &Config,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<i32> {
    let backups = BackupManager::from_config(config);
    let Some(latest) = backups.latest()? else {
        output.error("no snapshot to roll back to");
        return Ok(EXIT_FATAL);
    };

    output.progress(&format!(
        "Rolling back to snapshot {} (revision {})",
        latest.id,
        latest.revision.short()
    ));

    let env = Environment::connect(config, output)?;
    let c = env.collaborators();
    let controller = RollbackController::new(
        config,
        &backups,
        c.source,
        ServiceUpdater::new(config, c.provisioner),
        HealthProber::new(c.provisioner, c.http),
    );
    let report = controller.rollback(diag).await;

    let Some(restored) = report.restored else {
        output.error("snapshot could not be restored");
        return Ok(EXIT_FATAL);
    };

    if let Err(e) = backups.discard(&restored.id) {
        diag.warn(Warning::rollback(format!(
            "restored snapshot {} could not be discarded: {}",
            restored.id, e
        )));
    }

    output.success(&format!(
        "Rolled back to {} (snapshot {}{})",
        restored.revision.short(),
        restored.id,
        if report.healthy_after {
            ""
        } else {
            ", services not healthy"
        }
    ));
    Ok(EXIT_SUCCESS)
}
