// ABOUTME: Deploy command implementation.
// ABOUTME: Handles the deploy lock, hooks, and running the deployment driver.

use super::environment::Environment;
use horsestrap::config::Config;
use horsestrap::deploy::{
    DeployError, DeployLock, DeployOptions, DeploymentDriver, EXIT_FATAL, Verdict,
};
use horsestrap::diagnostics::{Diagnostics, Warning};
use horsestrap::error::{Error, Result};
use horsestrap::hooks::{HookContext, HookPoint, HookRunner};
use horsestrap::output::Output;

/// Deploy the project, returning the process exit code.
pub async fn deploy(
    config: &Config,
    opts: DeployOptions,
    break_lock: bool,
    output: &mut Output,
) -> Result<i32> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    output.progress(&format!(
        "Deploying {} (branch {})",
        config.project_dir.display(),
        config.branch
    ));

    let result = match DeployLock::acquire(
        &config.lock_path(),
        &config.project_dir,
        config.lock.stale_after,
        break_lock,
        &mut diag,
    ) {
        Ok(lock) => {
            let result = deploy_locked(config, opts, output, &mut diag).await;
            if let Err(e) = lock.release() {
                diag.warn(Warning::lock_release(e.to_string()));
            }
            result
        }
        Err(e) => Err(e.into()),
    };

    output.warnings(&diag);

    match result {
        Ok(verdict) => {
            output.verdict(verdict.as_str(), verdict.exit_code());
            Ok(verdict.exit_code())
        }
        Err(e) => {
            output.error(&e.to_string());
            output.verdict("ABORTED", EXIT_FATAL);
            Ok(EXIT_FATAL)
        }
    }
}

/// Inner deployment logic (runs while holding lock).
async fn deploy_locked(
    config: &Config,
    opts: DeployOptions,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<Verdict> {
    let hooks = HookRunner::from_config(config);

    if let Some(result) = hooks
        .run(HookPoint::PreDeploy, &HookContext::new(config))
        .await
    {
        if !result.success {
            if !result.stderr.is_empty() {
                eprintln!("{}", result.stderr.trim_end());
            }
            return Err(Error::Deploy(DeployError::precondition(
                "pre-deploy hook failed",
            )));
        }
    }

    let env = Environment::connect(config, output)
        .map_err(|e| Error::Deploy(DeployError::precondition(e.to_string())))?;
    let driver = DeploymentDriver::new(config, env.collaborators());
    let report = driver.run(opts, diag, output).await?;

    let context = HookContext::new(config)
        .revision(&report.attempt.revision_before)
        .new_revision(report.attempt.revision_after.as_ref())
        .outcome(report.verdict.as_str());

    match report.verdict {
        Verdict::Committed => {
            if let Some(result) = hooks.run(HookPoint::PostDeploy, &context).await {
                if !result.success {
                    diag.warn(Warning::hook("post-deploy hook failed"));
                }
            }
        }
        Verdict::RolledBack => {
            if let Some(ref cause) = report.cause {
                output.error(&format!("deployment rolled back: {}", cause));
            }
            if let Some(result) = hooks.run(HookPoint::OnError, &context).await {
                if !result.success {
                    diag.warn(Warning::hook("on-error hook failed"));
                }
            }
        }
        Verdict::Noop => {}
    }

    Ok(report.verdict)
}
