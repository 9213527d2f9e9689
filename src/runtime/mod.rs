// ABOUTME: External collaborators of the deployment core and their host implementations.
// ABOUTME: Compose provisioner, git source, postgres database, HTTP probe, runtime detection.

mod command;
mod compose;
mod detection;
mod error;
mod git;
mod http;
mod postgres;
pub mod traits;
mod types;

pub use command::{CommandOutput, DEFAULT_COMMAND_TIMEOUT, HostCommand};
pub use compose::{ComposeProvisioner, ComposeSettings, combine_health};
pub use detection::{DetectionError, detect_local};
pub use error::{CommandError, CommandErrorKind};
pub use git::GitSource;
pub use http::{DEFAULT_PROBE_TIMEOUT, HyperProbe, ProbeEndpoint};
pub use postgres::{ComposePostgres, PostgresTarget};
pub use traits::{
    Database, DatabaseError, HealthState, HttpProbe, ProvisionError, Provisioner, SourceControl,
    SourceError,
};
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};
