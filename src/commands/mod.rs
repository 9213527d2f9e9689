// ABOUTME: Command module aggregator for the horsestrap CLI.
// ABOUTME: Re-exports deploy, rollback, status, and backups command handlers.

mod backups;
mod deploy;
mod environment;
mod rollback;
mod status;

pub use backups::{list_backups, prune_backups};
pub use deploy::deploy;
pub use rollback::rollback;
pub use status::status;
