use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Check tokens outlive one healthcheck interval by this much.
const TOKEN_GRACE: Duration = Duration::from_secs(60);

/// Timing and sizing of the batch queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Seconds between two healthcheck ticks.
    pub healthcheck_interval_secs: u64,
    /// Seconds the process lock survives without a refresh.
    pub lock_ttl_secs: u64,
    /// Seconds one `handle` call may spend before yielding and re-dispatching.
    pub time_limit_secs: u64,
    /// Most rows persisted under one batch key.
    pub batch_size: usize,
    pub mailbox_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            healthcheck_interval_secs: 300,
            lock_ttl_secs: 60,
            time_limit_secs: 20,
            batch_size: 100,
            mailbox_capacity: 8,
        }
    }
}

impl QueueConfig {
    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_secs)
    }

    /// Long enough for the token to still exist on the following tick.
    pub fn token_ttl(&self) -> Duration {
        self.healthcheck_interval() + TOKEN_GRACE
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}
