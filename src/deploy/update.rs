// ABOUTME: Service updater: pulls images and recreates the application services.
// ABOUTME: The database service is only touched by an explicit full restart.

use crate::config::Config;
use crate::runtime::{ProvisionError, Provisioner};
use crate::types::{ImageId, ServiceName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub image_changed: bool,
    pub image_before: Option<ImageId>,
    pub image_after: Option<ImageId>,
}

pub struct ServiceUpdater<'a> {
    config: &'a Config,
    provisioner: &'a dyn Provisioner,
}

impl<'a> ServiceUpdater<'a> {
    pub fn new(config: &'a Config, provisioner: &'a dyn Provisioner) -> Self {
        Self {
            config,
            provisioner,
        }
    }

    /// Application services, never including the database service.
    pub fn app_services(&self) -> Vec<ServiceName> {
        let db = self.config.database.as_ref().map(|d| &d.service);
        self.config
            .app_services
            .iter()
            .filter(|s| Some(*s) != db)
            .cloned()
            .collect()
    }

    pub async fn apply(&self) -> Result<UpdateOutcome, ProvisionError> {
        let primary = &self.config.primary_service;

        self.provisioner.pull_images().await?;
        let image_before = self.provisioner.running_image(primary).await?;

        let services = self.app_services();
        self.provisioner.recreate(&services).await?;

        let image_after = self.provisioner.running_image(primary).await?;
        let image_changed = image_before != image_after;

        tracing::info!(
            services = services.len(),
            image_changed,
            image = image_after.as_ref().map(|i| i.short()).unwrap_or("-"),
            "services recreated"
        );
        Ok(UpdateOutcome {
            image_changed,
            image_before,
            image_after,
        })
    }

    /// Stop the application services.
    pub async fn stop_app_services(&self) -> Result<(), ProvisionError> {
        self.provisioner.stop(&self.app_services()).await
    }

    /// Full stop and start of every service, the database included.
    ///
    /// The start is attempted even when the stop fails, so a failed stop never
    /// leaves the stack torn down.
    pub async fn clean_restart(&self) -> CleanRestart {
        let stop = self.provisioner.stop_all().await;
        if let Err(ref e) = stop {
            tracing::warn!("stopping all services failed, starting anyway: {}", e);
        }
        let start = self.provisioner.start_all().await;
        CleanRestart { stop, start }
    }
}

/// Result of each half of a clean restart.
#[derive(Debug)]
pub struct CleanRestart {
    pub stop: Result<(), ProvisionError>,
    pub start: Result<(), ProvisionError>,
}

impl CleanRestart {
    /// Services were brought up, whatever happened to the stop.
    pub fn started(&self) -> bool {
        self.start.is_ok()
    }
}
