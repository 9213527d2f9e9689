// ABOUTME: Hooks system for deployment lifecycle events.
// ABOUTME: Discovers and executes scripts at pre-deploy, post-deploy, and on-error points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::Config;
use crate::runtime::DEFAULT_COMMAND_TIMEOUT;
use crate::types::Revision;

/// Hook execution points in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the backup. Failure aborts deployment.
    PreDeploy,
    /// After a committed deployment. Failure logs warning.
    PostDeploy,
    /// After a rollback. Failure logs warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort deployment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub project: PathBuf,
    pub branch: String,
    pub revision: Option<Revision>,
    pub new_revision: Option<Revision>,
    pub outcome: Option<String>,
}

impl HookContext {
    pub fn new(config: &Config) -> Self {
        Self {
            project: config.project_dir.clone(),
            branch: config.branch.clone(),
            revision: None,
            new_revision: None,
            outcome: None,
        }
    }

    pub fn revision(mut self, revision: &Revision) -> Self {
        self.revision = Some(revision.clone());
        self
    }

    pub fn new_revision(mut self, revision: Option<&Revision>) -> Self {
        self.new_revision = revision.cloned();
        self
    }

    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert(
            "HORSESTRAP_PROJECT".to_string(),
            self.project.display().to_string(),
        );
        env.insert("HORSESTRAP_BRANCH".to_string(), self.branch.clone());
        if let Some(ref rev) = self.revision {
            env.insert("HORSESTRAP_REVISION".to_string(), rev.to_string());
        }
        if let Some(ref rev) = self.new_revision {
            env.insert("HORSESTRAP_NEW_REVISION".to_string(), rev.to_string());
        }
        if let Some(ref outcome) = self.outcome {
            env.insert("HORSESTRAP_OUTCOME".to_string(), outcome.clone());
        }
        env
    }
}

/// What a hook run produced.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    /// None when the script was killed or could not be spawned.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HookResult {
    fn from_output(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    fn not_run(reason: String) -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: reason,
        }
    }
}

/// Runs the scripts in `.horsestrap/hooks/` with the deployment context in
/// their environment.
pub struct HookRunner {
    hooks_dir: PathBuf,
    working_dir: PathBuf,
    timeout: Duration,
}

impl HookRunner {
    /// Look for hooks in `hooks_dir`; scripts run from `working_dir`.
    pub fn new(hooks_dir: &Path, working_dir: &Path) -> Self {
        Self {
            hooks_dir: hooks_dir.to_path_buf(),
            working_dir: working_dir.to_path_buf(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.hooks_dir(), &config.project_dir).timeout(config.command_timeout)
    }

    /// Kill hooks that run longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run the hook for `point`. `None` means no hook is installed.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let path = self.hook_path(point);
        if !path.is_file() {
            return None;
        }

        let hook = point.filename();
        tracing::info!(hook, path = %path.display(), "running hook");

        let child = Command::new(&path)
            .envs(context.to_env())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(hook, "failed to start hook: {}", e);
                return Some(HookResult::not_run(e.to_string()));
            }
        };

        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => HookResult::from_output(output),
            Ok(Err(e)) => HookResult::not_run(e.to_string()),
            Err(_) => HookResult::not_run(format!(
                "hook timed out after {}s",
                self.timeout.as_secs()
            )),
        };

        if result.success {
            tracing::info!(hook, "hook finished");
        } else {
            tracing::warn!(hook, exit_code = ?result.exit_code, stderr = %result.stderr.trim(), "hook failed");
        }
        Some(result)
    }
}
