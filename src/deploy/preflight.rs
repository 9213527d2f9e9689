// ABOUTME: Preflight checks run before the backup; any failure aborts without rollback.
// ABOUTME: Verifies project layout, tooling, the current revision and the running stack.

use crate::config::Config;
use crate::runtime::{Database, ProvisionError, Provisioner, SourceControl};
use crate::types::Revision;

use super::DeployError;

pub struct Preflight<'a> {
    config: &'a Config,
    provisioner: &'a dyn Provisioner,
    source: &'a dyn SourceControl,
    database: Option<&'a dyn Database>,
}

impl<'a> Preflight<'a> {
    pub fn new(
        config: &'a Config,
        provisioner: &'a dyn Provisioner,
        source: &'a dyn SourceControl,
        database: Option<&'a dyn Database>,
    ) -> Self {
        Self {
            config,
            provisioner,
            source,
            database,
        }
    }

    /// Returns the currently deployed revision.
    ///
    /// With `allow_cold_start` the primary service need not be running yet,
    /// and the database is not queried.
    pub async fn check(&self, allow_cold_start: bool) -> Result<Revision, DeployError> {
        if !self.config.project_dir.is_dir() {
            return Err(DeployError::precondition(format!(
                "project directory {} does not exist",
                self.config.project_dir.display()
            )));
        }

        let compose_file = self.config.compose_file_path();
        if !compose_file.is_file() {
            return Err(DeployError::precondition(format!(
                "compose file {} not found",
                compose_file.display()
            )));
        }

        self.source
            .check_available()
            .await
            .map_err(|e| DeployError::precondition(e.to_string()))?;
        self.provisioner
            .check_available()
            .await
            .map_err(|e| DeployError::precondition(e.to_string()))?;

        let revision = self.source.current_revision().await.map_err(|e| {
            DeployError::precondition(format!("cannot read current revision: {}", e))
        })?;

        if !allow_cold_start {
            let primary = &self.config.primary_service;
            match self.provisioner.health_of(primary).await {
                Ok(_) => {}
                Err(ProvisionError::ServiceNotFound(_)) => {
                    return Err(DeployError::precondition(format!(
                        "no running environment: service {} has no containers (use --allow-cold-start for a first deploy)",
                        primary
                    )));
                }
                Err(e) => return Err(DeployError::precondition(e.to_string())),
            }

            if let (Some(db), Some(_)) = (self.database, &self.config.database) {
                db.exec_sql("SELECT 1").await.map_err(|e| {
                    DeployError::precondition(format!("database not reachable: {}", e))
                })?;
            }
        }

        tracing::debug!(revision = %revision.short(), "preflight passed");
        Ok(revision)
    }
}
