// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a run but should be shown to users.

/// Collects non-fatal warnings during deployment operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Database dump failed; the snapshot was kept without it.
    pub fn database_dump(message: impl Into<String>) -> Self {
        Self::new(WarningKind::DatabaseDump, message)
    }

    /// A configured config file was missing or unreadable.
    pub fn config_file(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ConfigFile, message)
    }

    /// A best-effort rollback step failed.
    pub fn rollback(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Rollback, message)
    }

    /// Failed to release deploy lock (lock file may remain).
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LockRelease, message)
    }

    pub fn stale_lock(message: impl Into<String>) -> Self {
        Self::new(WarningKind::StaleLock, message)
    }

    pub fn prune(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Prune, message)
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Hook, message)
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    DatabaseDump,
    ConfigFile,
    Rollback,
    LockRelease,
    StaleLock,
    Prune,
    Hook,
}
