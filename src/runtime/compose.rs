// ABOUTME: Compose-based provisioner: service lifecycle via the compose CLI.
// ABOUTME: Container health and image identity are read through the Docker-compatible API.

use super::command::HostCommand;
use super::error::CommandError;
use super::traits::{HealthState, ProvisionError, Provisioner};
use super::types::{RuntimeInfo, RuntimeType};
use crate::config::Config;
use crate::types::{ContainerId, ImageId, ServiceName};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerStateStatusEnum, HealthStatusEnum};
use bollard::query_parameters::{InspectContainerOptions, ListContainersOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const PROJECT_LABEL: &str = "com.docker.compose.project";
const SERVICE_LABEL: &str = "com.docker.compose.service";

/// Where the compose manifest lives and how to address its project.
#[derive(Debug, Clone)]
pub struct ComposeSettings {
    pub project_dir: PathBuf,
    pub compose_file: PathBuf,
    pub project: String,
    pub command_timeout: Duration,
}

impl ComposeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            project_dir: config.project_dir.clone(),
            compose_file: config.compose_file_path(),
            project: config.compose_project_name(),
            command_timeout: config.command_timeout,
        }
    }
}

/// Provisioner backed by `docker compose` / `podman compose`.
pub struct ComposeProvisioner {
    client: Docker,
    runtime_type: RuntimeType,
    settings: ComposeSettings,
}

impl ComposeProvisioner {
    /// Connect to the runtime socket described by `info`.
    pub fn connect(info: &RuntimeInfo, settings: ComposeSettings) -> Result<Self, ProvisionError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| ProvisionError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            runtime_type: info.runtime_type,
            settings,
        })
    }

    fn compose(&self) -> HostCommand {
        HostCommand::new(self.runtime_type.cli())
            .arg("compose")
            .arg("-f")
            .arg(self.settings.compose_file.to_string_lossy())
            .arg("-p")
            .arg(&self.settings.project)
            .current_dir(&self.settings.project_dir)
            .timeout(self.settings.command_timeout)
    }

    /// Containers belonging to a compose service, optionally including stopped ones.
    async fn containers_for(
        &self,
        service: &ServiceName,
        all: bool,
    ) -> Result<Vec<ContainerId>, ProvisionError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![
                format!("{}={}", PROJECT_LABEL, self.settings.project),
                format!("{}={}", SERVICE_LABEL, service),
            ],
        );

        let opts = ListContainersOptions {
            all,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| ProvisionError::Runtime(format!("failed to list containers: {}", e)))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| c.id)
            .map(ContainerId::new)
            .collect())
    }

    async fn inspect_health(&self, id: &ContainerId) -> Result<HealthState, ProvisionError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| ProvisionError::Runtime(format!("failed to inspect {}: {}", id, e)))?;

        let state = details.state.as_ref();
        match state.and_then(|s| s.status) {
            Some(ContainerStateStatusEnum::RUNNING) => {}
            Some(ContainerStateStatusEnum::CREATED)
            | Some(ContainerStateStatusEnum::RESTARTING) => return Ok(HealthState::Starting),
            _ => return Ok(HealthState::Unhealthy),
        }

        let health = state
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .map(|s| match s {
                HealthStatusEnum::STARTING => HealthState::Starting,
                HealthStatusEnum::HEALTHY => HealthState::Healthy,
                HealthStatusEnum::UNHEALTHY => HealthState::Unhealthy,
                _ => HealthState::Unknown,
            })
            .unwrap_or(HealthState::Unknown);

        Ok(health)
    }
}

fn map_command_error(e: CommandError) -> ProvisionError {
    ProvisionError::OperationFailed(e.to_string())
}

/// Combine the health of every replica of a service into one verdict.
///
/// Any unhealthy replica makes the service unhealthy; any replica still
/// starting keeps it starting. Replicas without a health check only count
/// as `Unknown` when no replica reports a real health status.
pub fn combine_health(states: &[HealthState]) -> HealthState {
    if states.contains(&HealthState::Unhealthy) {
        HealthState::Unhealthy
    } else if states.contains(&HealthState::Starting) {
        HealthState::Starting
    } else if states.contains(&HealthState::Healthy) {
        HealthState::Healthy
    } else {
        HealthState::Unknown
    }
}

#[async_trait]
impl Provisioner for ComposeProvisioner {
    async fn check_available(&self) -> Result<(), ProvisionError> {
        HostCommand::new(self.runtime_type.cli())
            .args(["compose", "version"])
            .timeout(Duration::from_secs(30))
            .run()
            .await
            .map_err(|e| ProvisionError::Unavailable(e.to_string()))?;

        self.client
            .ping()
            .await
            .map_err(|e| ProvisionError::Unavailable(format!("runtime API: {}", e)))?;
        Ok(())
    }

    async fn pull_images(&self) -> Result<(), ProvisionError> {
        self.compose()
            .args(["pull", "--quiet"])
            .run()
            .await
            .map_err(|e| ProvisionError::PullFailed(e.to_string()))?;
        Ok(())
    }

    async fn recreate(&self, services: &[ServiceName]) -> Result<(), ProvisionError> {
        if services.is_empty() {
            return Ok(());
        }
        self.compose()
            .args(["up", "-d", "--build", "--no-deps", "--force-recreate"])
            .args(services.iter().map(|s| s.to_string()))
            .run()
            .await
            .map_err(map_command_error)?;
        Ok(())
    }

    async fn stop(&self, services: &[ServiceName]) -> Result<(), ProvisionError> {
        if services.is_empty() {
            return Ok(());
        }
        self.compose()
            .arg("stop")
            .args(services.iter().map(|s| s.to_string()))
            .run()
            .await
            .map_err(map_command_error)?;
        Ok(())
    }

    async fn stop_all(&self) -> Result<(), ProvisionError> {
        self.compose()
            .arg("stop")
            .run()
            .await
            .map_err(map_command_error)?;
        Ok(())
    }

    async fn start_all(&self) -> Result<(), ProvisionError> {
        self.compose()
            .args(["up", "-d", "--remove-orphans"])
            .run()
            .await
            .map_err(map_command_error)?;
        Ok(())
    }

    async fn health_of(&self, service: &ServiceName) -> Result<HealthState, ProvisionError> {
        let containers = self.containers_for(service, true).await?;
        if containers.is_empty() {
            return Err(ProvisionError::ServiceNotFound(service.to_string()));
        }

        let mut states = Vec::with_capacity(containers.len());
        for id in &containers {
            states.push(self.inspect_health(id).await?);
        }
        Ok(combine_health(&states))
    }

    async fn running_image(
        &self,
        service: &ServiceName,
    ) -> Result<Option<ImageId>, ProvisionError> {
        let Some(id) = self.containers_for(service, false).await?.into_iter().next() else {
            return Ok(None);
        };

        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| ProvisionError::Runtime(format!("failed to inspect {}: {}", id, e)))?;

        Ok(details.image.map(ImageId::new))
    }
}
