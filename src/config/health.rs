// ABOUTME: Health probing configuration: retry budgets and the HTTP reachability probe.
// ABOUTME: Budgets are per probing loop; every loop gets its own copy.

use serde::Deserialize;
use std::time::Duration;

/// Bounded retry budget for one probing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProbeBudget {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl ProbeBudget {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Upper bound on time spent sleeping between attempts.
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

impl Default for ProbeBudget {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(2))
    }
}

pub(crate) fn default_rollback_probe() -> ProbeBudget {
    ProbeBudget::new(10, Duration::from_secs(3))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthConfig {
    /// Budget for each service health loop.
    #[serde(default)]
    pub services: ProbeBudget,

    #[serde(default)]
    pub http: Option<HttpProbeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpProbeConfig {
    pub url: String,

    /// Statuses counted as reachable. 404 is included by default: an app
    /// without a route at the probe URL is still serving.
    #[serde(default = "default_accepted_statuses")]
    pub accepted_statuses: Vec<u16>,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_http_budget")]
    pub budget: ProbeBudget,
}

pub fn default_accepted_statuses() -> Vec<u16> {
    vec![200, 302, 404]
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_http_budget() -> ProbeBudget {
    ProbeBudget::new(10, Duration::from_secs(3))
}
