// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::backup::Snapshot;
use crate::types::Revision;

use super::attempt::{DeploymentAttempt, Outcome};
use super::rollback::RollbackReport;
use super::state::{Committed, Initialized, Noop, Recoverable, RolledBack, Synced, Updated};
use super::sync::SyncOutcome;
use super::update::UpdateOutcome;

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (the snapshot,
/// sync and update outcomes) directly, so a snapshot is guaranteed to exist
/// in every state that can roll back.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) attempt: DeploymentAttempt,
    pub(crate) state: S,
}

impl Deployment<Initialized> {
    /// Begin an attempt from the currently deployed revision.
    pub fn new(revision_before: Revision) -> Self {
        Deployment {
            attempt: DeploymentAttempt::start(revision_before),
            state: Initialized,
        }
    }
}

impl<S> Deployment<S> {
    pub fn attempt(&self) -> &DeploymentAttempt {
        &self.attempt
    }

    pub fn revision_before(&self) -> &Revision {
        &self.attempt.revision_before
    }

    pub fn outcome(&self) -> Outcome {
        self.attempt.outcome()
    }
}

impl<S: Recoverable> Deployment<S> {
    /// The checkpoint a rollback from this state restores.
    pub fn snapshot(&self) -> &Snapshot {
        self.state.snapshot()
    }
}

impl Deployment<Synced> {
    pub fn sync_outcome(&self) -> &SyncOutcome {
        &self.state.sync
    }
}

impl Deployment<Updated> {
    pub fn update_outcome(&self) -> &UpdateOutcome {
        &self.state.update
    }
}

impl Deployment<Committed> {
    pub fn committed_snapshot(&self) -> &Snapshot {
        &self.state.snapshot
    }

    pub fn update_outcome(&self) -> &UpdateOutcome {
        &self.state.update
    }
}

impl Deployment<Noop> {
    pub fn committed_snapshot(&self) -> &Snapshot {
        &self.state.snapshot
    }
}

impl Deployment<RolledBack> {
    pub fn restored_snapshot(&self) -> &Snapshot {
        &self.state.snapshot
    }

    pub fn rollback_report(&self) -> &RollbackReport {
        &self.state.report
    }
}
