// ABOUTME: HTTP probe trait for external reachability checks.
// ABOUTME: Network failures and timeouts collapse to no status code.

use async_trait::async_trait;

/// Issues a single request and reports the response status.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Status code returned by `url`, or `None` if no response arrived.
    async fn status_code(&self, url: &str) -> Option<u16>;
}
