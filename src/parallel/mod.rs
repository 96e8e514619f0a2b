//! Partitioned parallel execution with a shared worker quota
//!
//! This module provides the coordination primitive used to process a record set of
//! known length with several threads at once, without letting independent operations
//! running in the same process oversubscribe the machine.
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Admission**: [`WorkerQuota`] hands out worker counts from a process-wide pool of
//!   "extra" worker slots, degrading to a single worker when the pool is exhausted
//! - **Partitioning**: [`TaskRunner`] splits `0..item_count` into contiguous, disjoint
//!   ranges, one per worker, with the remainder absorbed by the last worker
//! - **Execution**: one scoped thread per partition, a join barrier, and cooperative
//!   cancellation polled between items
//!
//! ## What This Module Does NOT Do:
//! - **Work stealing**: partitions are fixed up front
//! - **Fair queueing**: the quota only throttles, it never queues or refuses
//! - **Per-item semantics**: the per-item function is an opaque callback
//!
//! # Error Contract
//!
//! ```text
//! ┌──────────────┐  run()   ┌──────────────────┐
//! │   Caller     │─────────▶│   TaskRunner     │──▶ Err(Cancelled) only
//! │              │          │                  │
//! │              │◀─────────│ has_error()/err()│──▶ business error, if any
//! └──────────────┘          └──────────────────┘
//! ```
//!
//! `run` reports cancellation only. A failure returned by the per-item function is
//! stored on the runner and must be inspected separately after `run` returns `Ok`.
//!
//! # Example Usage
//!
//! ```rust
//! use shardrun::parallel::{CancelToken, TaskRunner, WorkerQuota};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let quota = Arc::new(WorkerQuota::new(4));
//! let runner = TaskRunner::new(quota, 1_000, 0);
//! let sum = AtomicUsize::new(0);
//!
//! runner
//!     .run(&CancelToken::new(), |i| {
//!         sum.fetch_add(i, Ordering::Relaxed);
//!         Ok(())
//!     })
//!     .expect("not cancelled");
//!
//! assert!(!runner.has_error());
//! assert_eq!(sum.load(Ordering::Relaxed), (0..1_000).sum::<usize>());
//! ```

pub mod cancel;
pub mod quota;
pub mod runner;

// Re-export main types for easier access
pub use cancel::{CancelSignal, CancelToken, Never};
pub use quota::{DEFAULT_MIN_ITEMS_PER_WORKER, WorkerQuota};
pub use runner::{RunError, TaskRunner};
