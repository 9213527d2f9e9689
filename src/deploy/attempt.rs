// ABOUTME: Record of one deployment attempt from start to its terminal outcome.
// ABOUTME: Owned by the driver; terminal once the outcome leaves pending.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Revision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Succeeded,
    Failed,
    RolledBack,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Pending => "pending",
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::RolledBack => "rolled_back",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeploymentAttempt {
    pub started_at: DateTime<Utc>,
    pub revision_before: Revision,
    pub revision_after: Option<Revision>,
    outcome: Outcome,
}

impl DeploymentAttempt {
    pub fn start(revision_before: Revision) -> Self {
        Self {
            started_at: Utc::now(),
            revision_before,
            revision_after: None,
            outcome: Outcome::Pending,
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Set the terminal outcome. The first terminal outcome wins.
    pub(crate) fn conclude(&mut self, outcome: Outcome) {
        if self.outcome.is_terminal() {
            tracing::debug!(current = %self.outcome, ignored = %outcome, "attempt already concluded");
            return;
        }
        self.outcome = outcome;
    }
}
