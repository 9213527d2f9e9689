// ABOUTME: Health prober: bounded-retry polling of service health and HTTP reachability.
// ABOUTME: Fixed interval between attempts; one boolean verdict per target.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::config::{Config, ProbeBudget};
use crate::runtime::{HealthState, HttpProbe, Provisioner};
use crate::types::ServiceName;

/// Something whose health can be sampled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    /// Container health of a compose service.
    Service(ServiceName),
    /// External reachability of a URL.
    Http { url: String, accepted: Vec<u16> },
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Service(name) => write!(f, "service {}", name),
            ProbeTarget::Http { url, .. } => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Starting,
    Healthy,
    Unhealthy,
    Unreachable,
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeState::Starting => "starting",
            ProbeState::Healthy => "healthy",
            ProbeState::Unhealthy => "unhealthy",
            ProbeState::Unreachable => "unreachable",
        };
        f.write_str(s)
    }
}

/// One observation. Never persisted.
#[derive(Debug, Clone)]
pub struct ServiceHealthReport {
    pub target: ProbeTarget,
    pub state: ProbeState,
    pub sampled_at: DateTime<Utc>,
}

impl ServiceHealthReport {
    pub fn is_healthy(&self) -> bool {
        self.state == ProbeState::Healthy
    }
}

/// Targets checked after an update: every application service, then the
/// HTTP endpoint when one is configured.
pub fn verification_targets(config: &Config) -> Vec<(ProbeTarget, ProbeBudget)> {
    let db = config.database.as_ref().map(|d| &d.service);
    let mut targets: Vec<(ProbeTarget, ProbeBudget)> = config
        .app_services
        .iter()
        .filter(|s| Some(*s) != db)
        .map(|s| (ProbeTarget::Service(s.clone()), config.health.services))
        .collect();

    if let Some(ref http) = config.health.http {
        targets.push((
            ProbeTarget::Http {
                url: http.url.clone(),
                accepted: http.accepted_statuses.clone(),
            },
            http.budget,
        ));
    }
    targets
}

pub struct HealthProber<'a> {
    provisioner: &'a dyn Provisioner,
    http: &'a dyn HttpProbe,
}

impl<'a> HealthProber<'a> {
    pub fn new(provisioner: &'a dyn Provisioner, http: &'a dyn HttpProbe) -> Self {
        Self { provisioner, http }
    }

    /// Take a single sample.
    pub async fn sample(&self, target: &ProbeTarget) -> ServiceHealthReport {
        let state = match target {
            ProbeTarget::Service(name) => match self.provisioner.health_of(name).await {
                // A container without a healthcheck reports no health; running is enough.
                Ok(HealthState::Healthy) | Ok(HealthState::Unknown) => ProbeState::Healthy,
                Ok(HealthState::Starting) => ProbeState::Starting,
                Ok(HealthState::Unhealthy) => ProbeState::Unhealthy,
                Err(e) => {
                    tracing::debug!(service = %name, "health sample failed: {}", e);
                    ProbeState::Unreachable
                }
            },
            ProbeTarget::Http { url, accepted } => match self.http.status_code(url).await {
                Some(code) if accepted.contains(&code) => ProbeState::Healthy,
                Some(code) => {
                    tracing::debug!(%url, code, "unaccepted status");
                    ProbeState::Unhealthy
                }
                None => ProbeState::Unreachable,
            },
        };

        ServiceHealthReport {
            target: target.clone(),
            state,
            sampled_at: Utc::now(),
        }
    }

    /// Poll until healthy or the budget is spent.
    ///
    /// Sleeps `interval` between attempts, not after the last one.
    pub async fn probe(&self, target: &ProbeTarget, budget: ProbeBudget) -> bool {
        for attempt in 1..=budget.max_attempts {
            let report = self.sample(target).await;
            tracing::debug!(
                %target,
                attempt,
                max_attempts = budget.max_attempts,
                state = %report.state,
                "health sample"
            );
            if report.is_healthy() {
                return true;
            }
            if attempt < budget.max_attempts {
                tokio::time::sleep(budget.interval).await;
            }
        }

        tracing::warn!(%target, attempts = budget.max_attempts, "probe budget exhausted");
        false
    }

    /// Probe each target with its own budget. Stops at the first failure and
    /// returns that target.
    pub async fn probe_all(
        &self,
        targets: &[(ProbeTarget, ProbeBudget)],
    ) -> Result<(), ProbeTarget> {
        for (target, budget) in targets {
            if !self.probe(target, *budget).await {
                return Err(target.clone());
            }
        }
        Ok(())
    }
}
