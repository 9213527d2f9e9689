// ABOUTME: Deployment state types for the type state pattern.
// ABOUTME: States carry their own data; only post-backup states can roll back.

use crate::backup::Snapshot;

use super::rollback::RollbackReport;
use super::sync::SyncOutcome;
use super::update::UpdateOutcome;

/// Initial state: preflight passed, nothing touched yet.
/// Available actions: `backup()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Checkpoint taken.
/// Available actions: `sync()`, `rollback()`
#[derive(Debug, Clone)]
pub struct BackedUp {
    pub(crate) snapshot: Snapshot,
}

/// Working tree at the upstream revision.
/// Available actions: `update()`, `finish_noop()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Synced {
    pub(crate) snapshot: Snapshot,
    pub(crate) sync: SyncOutcome,
}

/// Application services recreated.
/// Available actions: `verify()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Updated {
    pub(crate) snapshot: Snapshot,
    pub(crate) sync: SyncOutcome,
    pub(crate) update: UpdateOutcome,
}

/// Terminal success: all probes passed.
#[derive(Debug, Clone)]
pub struct Committed {
    pub(crate) snapshot: Snapshot,
    pub(crate) update: UpdateOutcome,
}

/// Terminal success: nothing changed upstream.
#[derive(Debug, Clone)]
pub struct Noop {
    pub(crate) snapshot: Snapshot,
}

/// Terminal failure: the latest snapshot was restored.
#[derive(Debug, Clone)]
pub struct RolledBack {
    pub(crate) snapshot: Snapshot,
    pub(crate) report: RollbackReport,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::BackedUp {}
    impl Sealed for super::Synced {}
    impl Sealed for super::Updated {}
}

/// States reached after a successful backup. Only these can roll back.
pub trait Recoverable: sealed::Sealed {
    fn snapshot(&self) -> &Snapshot;
}

impl Recoverable for BackedUp {
    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Recoverable for Synced {
    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Recoverable for Updated {
    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}
