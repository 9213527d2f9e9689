// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Backup, sync, update, probe, and rollback components plus the driver.

mod attempt;
mod deployment;
mod driver;
mod error;
mod lock;
mod preflight;
mod probe;
mod rollback;
mod state;
mod sync;
mod transitions;
mod update;

pub use attempt::{DeploymentAttempt, Outcome};
pub use deployment::Deployment;
pub use driver::{
    Collaborators, DeployOptions, DeploymentDriver, DeploymentReport, EXIT_FATAL,
    EXIT_ROLLED_BACK, EXIT_SUCCESS, Verdict,
};
pub use error::{DeployError, DeployErrorKind, LockHolderInfo};
pub use lock::{DeployLock, LockInfo};
pub use preflight::Preflight;
pub use probe::{
    HealthProber, ProbeState, ProbeTarget, ServiceHealthReport, verification_targets,
};
pub use rollback::{RollbackController, RollbackReport};
pub use state::{BackedUp, Committed, Initialized, Noop, Recoverable, RolledBack, Synced, Updated};
pub use sync::{SourceSynchronizer, SyncOutcome};
pub use transitions::TransitionResult;
pub use update::{CleanRestart, ServiceUpdater, UpdateOutcome};
