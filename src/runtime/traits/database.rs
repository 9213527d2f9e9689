// ABOUTME: Database trait for the stateful service of the stack.
// ABOUTME: Executes SQL and writes dumps for snapshots.

use async_trait::async_trait;
use std::path::Path;

/// Operations against the stack's database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a single SQL statement.
    async fn exec_sql(&self, query: &str) -> Result<(), DatabaseError>;

    /// Write a full dump of the database to `path`.
    async fn backup_to(&self, path: &Path) -> Result<(), DatabaseError>;
}

/// Errors from database operations.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("dump failed: {0}")]
    DumpFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
