// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::diagnostics::Diagnostics;
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    fn emit(&self, event: &JsonEvent<'_>, to_stderr: bool) {
        if let Ok(json) = serde_json::to_string(event) {
            if to_stderr {
                eprintln!("{json}");
            } else {
                println!("{json}");
            }
        }
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Status line for one deployment step.
    pub fn step(&self, step: &str, outcome: &str) {
        tracing::info!(step, outcome, "deployment step");
        match self.mode {
            OutputMode::Normal => println!("  → {step}: {outcome}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit(
                &JsonEvent {
                    event: "step",
                    step: Some(step),
                    outcome: Some(outcome),
                    ..JsonEvent::default()
                },
                false,
            ),
        }
    }

    /// Final line of a deployment run, printed in every mode.
    pub fn verdict(&self, verdict: &str, exit_code: i32) {
        tracing::info!(verdict, exit_code, "deployment finished");
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{verdict} exit={exit_code} ({elapsed:.1}s)");
                } else {
                    println!("{verdict} exit={exit_code}");
                }
            }
            OutputMode::Quiet => println!("{verdict} exit={exit_code}"),
            OutputMode::Json => self.emit(
                &JsonEvent {
                    event: "result",
                    verdict: Some(verdict),
                    exit_code: Some(exit_code),
                    duration_secs: self.duration(),
                    ..JsonEvent::default()
                },
                false,
            ),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => self.emit(
                &JsonEvent {
                    event: "success",
                    message: Some(message),
                    duration_secs: self.duration(),
                    ..JsonEvent::default()
                },
                false,
            ),
        }
    }

    /// Print collected warnings.
    pub fn warnings(&self, diag: &Diagnostics) {
        for warning in diag.warnings() {
            match self.mode {
                OutputMode::Normal | OutputMode::Quiet => {
                    eprintln!("Warning: {}", warning.message);
                }
                OutputMode::Json => self.emit(
                    &JsonEvent {
                        event: "warning",
                        message: Some(&warning.message),
                        ..JsonEvent::default()
                    },
                    true,
                ),
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => self.emit(
                &JsonEvent {
                    event: "error",
                    message: Some(message),
                    duration_secs: self.duration(),
                    ..JsonEvent::default()
                },
                true,
            ),
        }
    }
}

#[derive(Serialize, Default)]
struct JsonEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
