use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_chars() -> usize {
    5000
}

fn default_max_texts() -> usize {
    128
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    30000
}

/// Budgets for one flush cycle of the batching aggregator.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    /// Cumulative character budget across all texts in one batch
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Item count budget for one batch
    #[serde(default = "default_max_texts")]
    pub max_texts: usize,
    /// Period between flushes of a non-empty queue
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Upper bound on one backend call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl BatchConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            max_texts: default_max_texts(),
            flush_interval_ms: default_flush_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
