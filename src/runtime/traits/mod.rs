// ABOUTME: Narrow capability traits for the deployment's external collaborators.
// ABOUTME: Defines Provisioner, SourceControl, Database, and HttpProbe.

mod database;
mod probe;
mod provision;
mod source;

pub use database::{Database, DatabaseError};
pub use probe::HttpProbe;
pub use provision::{HealthState, ProvisionError, Provisioner};
pub use source::{SourceControl, SourceError};
