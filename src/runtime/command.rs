// ABOUTME: Host command execution with working directory and deadline.
// ABOUTME: Shared by the git, compose, and database collaborators.

use super::error::{CommandError, ExitedSnafu, SpawnSnafu, TimedOutSnafu};
use snafu::ResultExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Default deadline for a single host command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Output from a host command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` if terminated by a signal.
    pub exit_code: Option<i32>,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A host command invocation.
#[derive(Debug, Clone)]
pub struct HostCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command line as a single string, for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion and capture output. A non-zero exit is not an error.
    pub async fn output(&self) -> Result<CommandOutput, CommandError> {
        self.execute(Stdio::piped()).await
    }

    /// Run to completion, failing on a non-zero exit.
    pub async fn run(&self) -> Result<CommandOutput, CommandError> {
        let output = self.output().await?;
        self.check(output)
    }

    /// Run to completion with stdout redirected into `path`.
    pub async fn run_to_file(&self, path: &Path) -> Result<(), CommandError> {
        let file = std::fs::File::create(path).context(SpawnSnafu {
            program: self.program.clone(),
        })?;
        let output = self.execute(Stdio::from(file)).await?;
        self.check(output).map(|_| ())
    }

    fn check(&self, output: CommandOutput) -> Result<CommandOutput, CommandError> {
        if output.success() {
            return Ok(output);
        }
        let status = match output.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "signal".to_string(),
        };
        ExitedSnafu {
            command: self.display(),
            status,
            stderr: output.stderr.trim().to_string(),
        }
        .fail()
    }

    async fn execute(&self, stdout: Stdio) -> Result<CommandOutput, CommandError> {
        tracing::debug!(command = %self.display(), "running host command");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().context(SpawnSnafu {
            program: self.program.clone(),
        })?;

        // Dropping the wait future on timeout kills the child (kill_on_drop).
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context(SpawnSnafu {
                program: self.program.clone(),
            })?,
            Err(_elapsed) => {
                return TimedOutSnafu {
                    command: self.display(),
                    timeout: self.timeout,
                }
                .fail();
            }
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
