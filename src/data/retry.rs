//! Bounded-timeout retry for collaborator calls.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DataConfig;
use crate::types::PropError;

/// Timeout per attempt, attempt cap and linear backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl From<&DataConfig> for RetryPolicy {
    fn from(c: &DataConfig) -> Self {
        Self {
            timeout: c.timeout(),
            max_attempts: c.max_attempts.max(1),
            backoff: c.backoff(),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or attempts run out.
    ///
    /// Attempt `n` (1-based) waits `backoff * (n - 1)` before starting.
    /// Exhaustion surfaces as `PropError::DataSource` carrying the last
    /// failure.
    pub async fn run<T, F, Fut>(&self, source_name: &str, mut op: F) -> Result<T, PropError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = self.backoff * (attempt - 1);
                debug!(source = source_name, attempt, delay_ms = delay.as_millis() as u64, "Retrying");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    warn!(source = source_name, attempt, error = %e, "Lookup failed");
                    last_error = format!("{e:#}");
                }
                Err(_) => {
                    warn!(
                        source = source_name,
                        attempt,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Lookup timed out"
                    );
                    last_error = format!("timed out after {}ms", self.timeout.as_millis());
                }
            }
        }

        Err(PropError::DataSource {
            source_name: source_name.to_string(),
            message: format!("failed after {attempts} attempts: {last_error}"),
        })
    }
}
