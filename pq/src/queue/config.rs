//! Queue configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How the drain loop hands an operation off once its start time arrives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Await each operation before considering the next one
    #[default]
    Sequential,

    /// Spawn each operation and move on; only start times are paced
    Paced,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Sequential => write!(f, "sequential"),
            DispatchMode::Paced => write!(f, "paced"),
        }
    }
}

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Minimum time between the start of two consecutive operations
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Dispatch behaviour of the drain loop
    pub dispatch: DispatchMode,
}

fn default_min_delay_ms() -> u64 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            dispatch: DispatchMode::default(),
        }
    }
}

impl QueueConfig {
    /// Config with the given minimum delay and default dispatch mode
    ///
    /// The delay is rounded up to a whole millisecond so the floor is never
    /// lower than requested.
    pub fn with_min_delay(min_delay: Duration) -> Self {
        let min_delay_ms = u64::try_from(min_delay.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        Self {
            min_delay_ms,
            ..Default::default()
        }
    }

    /// Get the minimum delay as a Duration
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}
