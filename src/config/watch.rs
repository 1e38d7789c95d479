use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

use crate::Result;

/// Per-session watch behaviour
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Timeout applied when [`WatchOptions`](crate::WatchOptions) does not set one,
    /// measured from watch start. `0` disables it.
    ///
    /// **Default**: 1_800_000 (30 minutes)
    #[serde(default = "default_timeout_in_ms")]
    pub default_timeout_in_ms: u64,

    /// Maximum number of undelivered notifications buffered per session.
    ///
    /// `0` keeps the buffer unbounded. Otherwise the oldest undelivered
    /// notification is dropped (and counted) to make room for a new one;
    /// the upstream connection is never throttled.
    ///
    /// **Default**: 0
    #[serde(default)]
    pub max_pending_events: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            default_timeout_in_ms: default_timeout_in_ms(),
            max_pending_events: 0,
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_events > 0 && self.max_pending_events < 16 {
            warn!(
                "watch.max_pending_events ({}) is very small; slow consumers will lose notifications",
                self.max_pending_events
            );
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        match self.default_timeout_in_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

fn default_timeout_in_ms() -> u64 {
    30 * 60 * 1000
}
