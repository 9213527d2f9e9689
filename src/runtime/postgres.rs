// ABOUTME: PostgreSQL collaborator reached through the compose database service.
// ABOUTME: Runs psql and pg_dump inside the container with `compose exec -T`.

use super::command::HostCommand;
use super::compose::ComposeSettings;
use super::traits::{Database, DatabaseError};
use super::types::RuntimeType;
use crate::types::ServiceName;
use async_trait::async_trait;
use std::path::Path;

/// Connection parameters for the database service.
#[derive(Debug, Clone)]
pub struct PostgresTarget {
    pub service: ServiceName,
    pub user: String,
    pub database: String,
}

/// Database collaborator executing client tools inside the database service.
pub struct ComposePostgres {
    runtime_type: RuntimeType,
    settings: ComposeSettings,
    target: PostgresTarget,
}

impl ComposePostgres {
    pub fn new(runtime_type: RuntimeType, settings: ComposeSettings, target: PostgresTarget) -> Self {
        Self {
            runtime_type,
            settings,
            target,
        }
    }

    fn exec(&self) -> HostCommand {
        HostCommand::new(self.runtime_type.cli())
            .arg("compose")
            .arg("-f")
            .arg(self.settings.compose_file.to_string_lossy())
            .arg("-p")
            .arg(&self.settings.project)
            .args(["exec", "-T"])
            .arg(self.target.service.as_str())
            .current_dir(&self.settings.project_dir)
            .timeout(self.settings.command_timeout)
    }
}

#[async_trait]
impl Database for ComposePostgres {
    async fn exec_sql(&self, query: &str) -> Result<(), DatabaseError> {
        self.exec()
            .args(["psql", "-v", "ON_ERROR_STOP=1", "-U"])
            .arg(&self.target.user)
            .arg("-d")
            .arg(&self.target.database)
            .arg("-c")
            .arg(query)
            .run()
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    async fn backup_to(&self, path: &Path) -> Result<(), DatabaseError> {
        let result = self
            .exec()
            .args(["pg_dump", "--clean", "--if-exists", "-U"])
            .arg(&self.target.user)
            .arg(&self.target.database)
            .run_to_file(path)
            .await;

        if let Err(e) = result {
            // Never leave a truncated dump behind.
            let _ = std::fs::remove_file(path);
            return Err(DatabaseError::DumpFailed(e.to_string()));
        }
        Ok(())
    }
}
