use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::config_error;
use crate::Result;

/// Reconnect policy used when resuming a watch after a retryable failure
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of consecutive reconnects without a delivered
    /// notification (0 means unlimited retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(config_error("retry.base_delay_ms must be greater than 0"));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(config_error(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }

        Ok(())
    }

    /// Whether another reconnect is allowed after `attempts` consecutive failures
    pub fn allows(
        &self,
        attempts: usize,
    ) -> bool {
        self.max_retries == 0 || attempts < self.max_retries
    }

    /// Exponential delay for the given attempt (0-based), capped at
    /// `max_delay_ms`, plus up to 25% jitter.
    pub fn delay_for(
        &self,
        attempt: u32,
    ) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let capped = exp.min(self.max_delay_ms);
        let jitter = rand::random::<u64>() % (capped / 4 + 1);
        Duration::from_millis(capped + jitter)
    }
}

fn default_max_retries() -> usize {
    5
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
