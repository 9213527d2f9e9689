// ABOUTME: Provisioning layer trait for the service manifest runtime.
// ABOUTME: Pull images, recreate or stop services, and report per-service health.

use crate::types::{ImageId, ServiceName};
use async_trait::async_trait;

/// Health of a named service as reported by the provisioning layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Health check defined and still in its start period.
    Starting,
    /// Health check defined and passing.
    Healthy,
    /// Health check failing, or the service is not running.
    Unhealthy,
    /// Running with no health check defined.
    Unknown,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthState::Starting => "starting",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Service lifecycle operations against a declarative service manifest.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Verify the provisioning tool is installed and responding.
    async fn check_available(&self) -> Result<(), ProvisionError>;

    /// Pull the images of every service in the manifest.
    async fn pull_images(&self) -> Result<(), ProvisionError>;

    /// Recreate the named services without touching their dependencies.
    async fn recreate(&self, services: &[ServiceName]) -> Result<(), ProvisionError>;

    /// Stop the named services.
    async fn stop(&self, services: &[ServiceName]) -> Result<(), ProvisionError>;

    /// Stop every service in the manifest, stateful ones included.
    async fn stop_all(&self) -> Result<(), ProvisionError>;

    /// Start every service in the manifest.
    async fn start_all(&self) -> Result<(), ProvisionError>;

    /// Current health of a service.
    async fn health_of(&self, service: &ServiceName) -> Result<HealthState, ProvisionError>;

    /// Image identity of the running container for a service, if any.
    async fn running_image(&self, service: &ServiceName)
    -> Result<Option<ImageId>, ProvisionError>;
}

/// Errors from provisioning operations.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("provisioning tool unavailable: {0}")]
    Unavailable(String),

    #[error("image pull failed: {0}")]
    PullFailed(String),

    #[error("service operation failed: {0}")]
    OperationFailed(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
