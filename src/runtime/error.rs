// ABOUTME: Subprocess error types with the SNAFU pattern.
// ABOUTME: Unifies spawn, exit-status, and timeout failures of host tools.

use snafu::Snafu;
use std::time::Duration;

/// Failure of a host tool invocation (git, docker compose, ...).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CommandError {
    #[snafu(display("failed to run `{program}`: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("`{command}` exited with {status}: {stderr}"))]
    Exited {
        command: String,
        status: String,
        stderr: String,
    },

    #[snafu(display("`{command}` timed out after {timeout:?}"))]
    TimedOut { command: String, timeout: Duration },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// The program could not be started (usually not installed).
    NotRunnable,
    /// The program ran and reported failure.
    Failed,
    /// The program did not finish before its deadline.
    TimedOut,
}

impl CommandError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> CommandErrorKind {
        match self {
            CommandError::Spawn { .. } => CommandErrorKind::NotRunnable,
            CommandError::Exited { .. } => CommandErrorKind::Failed,
            CommandError::TimedOut { .. } => CommandErrorKind::TimedOut,
        }
    }

    /// Captured stderr of a failed invocation.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CommandError::Exited { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
