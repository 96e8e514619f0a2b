//! # shardrun - quota-aware partitioned task runner
//!
//! shardrun processes record sets of known length on several threads at once while
//! keeping independent operations in the same process from oversubscribing CPU
//! cores.
//!
//! ## Features
//!
//! - **Shared worker quota**: [`parallel::WorkerQuota`] hands out worker counts from a
//!   process-wide pool and never refuses service, degrading to a single worker
//! - **Contiguous partitions**: [`parallel::TaskRunner`] splits `0..n` into one range
//!   per worker, the last absorbing the remainder
//! - **Cooperative cancellation**: [`parallel::CancelToken`] with reasons and deadlines,
//!   polled between items
//! - **Named views**: [`views::InlineTables`] registers record sets by name for later
//!   lookup
//!
//! ## Quick Start
//!
//! ```bash
//! # Keep the rows of a CSV file whose "status" column says "failed"
//! shardrun scan orders.csv --column status --pattern '^failed$'
//!
//! # Count matches with at most 4 workers and a 2 second timeout
//! shardrun scan orders.csv -p 'refund' --cpu 4 --timeout-ms 2000 --count
//! ```

pub mod cli;
pub mod config;
pub mod parallel;
pub mod views;

pub use cli::{Cli, Output};
pub use config::{Settings, ShardrunConfig};

/// Result type alias for shardrun operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
