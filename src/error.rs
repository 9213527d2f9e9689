// ABOUTME: Application-wide error types for horsestrap.
// ABOUTME: Uses thiserror for configuration, filesystem, and command-level failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime detection failed: {0}")]
    RuntimeDetection(String),

    #[error("{0}")]
    Deploy(#[from] crate::deploy::DeployError),

    #[error("backup error: {0}")]
    Backup(#[from] crate::backup::BackupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
