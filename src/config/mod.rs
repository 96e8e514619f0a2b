//! Configuration management for shardrun
//!
//! Settings are layered with figment: embedded defaults, user config, repository
//! config, an explicit `--config` file, and `SHARDRUN_` environment variables.
//! See [`ShardrunConfig`] for the exact order.

use serde::{Deserialize, Serialize};

pub mod core;

pub use self::core::ShardrunConfig;

use crate::parallel::DEFAULT_MIN_ITEMS_PER_WORKER;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Worker quota settings
    pub parallel: ParallelSettings,

    /// Defaults for the `scan` command
    pub scan: ScanSettings,
}

/// Worker quota settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelSettings {
    /// Maximum workers per operation (0 = number of logical CPUs)
    pub max_workers: usize,

    /// Items required to justify one additional worker
    pub min_items_per_worker: usize,
}

impl ParallelSettings {
    /// Resolve `max_workers`, substituting the logical CPU count for 0
    pub fn effective_max_workers(&self) -> usize {
        if self.max_workers == 0 {
            num_cpus::get()
        } else {
            self.max_workers
        }
    }
}

impl Default for ParallelSettings {
    fn default() -> Self {
        Self {
            max_workers: 0,
            min_items_per_worker: DEFAULT_MIN_ITEMS_PER_WORKER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Timeout in milliseconds (0 = none)
    pub timeout_ms: u64,

    /// Treat the first CSV row as a header
    pub has_headers: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            has_headers: true,
        }
    }
}
