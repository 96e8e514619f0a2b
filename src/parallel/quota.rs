use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::ParallelSettings;

/// Number of items that justify one additional worker unless overridden per call
pub const DEFAULT_MIN_ITEMS_PER_WORKER: usize = 80;

/// Process-wide pool of extra worker slots
///
/// Every operation gets one baseline worker for free. Any workers beyond that are
/// charged against `reserved` until they finish. This is soft admission control: a
/// burst of reservations taken before any release can still exceed `max_workers`,
/// and a reservation never fails, it only shrinks towards a single worker.
///
/// Construct one at startup and share it as `Arc<WorkerQuota>`.
#[derive(Debug)]
pub struct WorkerQuota {
    reserved: Mutex<usize>,
    min_items_per_worker: usize,
    max_workers: usize,
}

impl WorkerQuota {
    pub fn new(max_workers: usize) -> Self {
        Self {
            reserved: Mutex::new(0),
            min_items_per_worker: DEFAULT_MIN_ITEMS_PER_WORKER,
            max_workers: max_workers.max(1),
        }
    }

    /// Quota sized to the number of logical CPUs
    pub fn from_cpus() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn from_settings(settings: &ParallelSettings) -> Self {
        Self::new(settings.effective_max_workers())
            .with_min_items_per_worker(settings.min_items_per_worker)
    }

    /// Override the default items-per-worker threshold. Values below 1 keep the default.
    pub fn with_min_items_per_worker(mut self, min_items: usize) -> Self {
        if min_items >= 1 {
            self.min_items_per_worker = min_items;
        }
        self
    }

    /// Reserve workers for an operation over `item_count` items
    ///
    /// `min_per_worker_override` below 1 falls back to the quota's default threshold.
    /// Always returns at least 1. The caller owes exactly `returned - 1` calls to
    /// [`release`](Self::release).
    pub fn reserve(&self, item_count: usize, min_per_worker_override: usize) -> usize {
        let min_per_worker = if min_per_worker_override < 1 {
            self.min_items_per_worker
        } else {
            min_per_worker_override
        };

        let by_work = (item_count / min_per_worker).max(1);
        let mut workers = self.max_workers.min(by_work);

        let mut reserved = self.lock();
        let slack = workers.saturating_sub(*reserved).max(1);
        workers = workers.min(slack);
        *reserved += workers - 1;

        tracing::debug!(
            "Reserved {} worker(s) for {} items (extra slots in use: {})",
            workers,
            item_count,
            *reserved
        );
        workers
    }

    /// Return one extra slot to the pool. No-op when nothing is reserved.
    pub fn release(&self) {
        let mut reserved = self.lock();
        if *reserved > 0 {
            *reserved -= 1;
        }
    }

    /// Extra slots currently reserved across all live operations
    pub fn reserved_slots(&self) -> usize {
        *self.lock()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn min_items_per_worker(&self) -> usize {
        self.min_items_per_worker
    }

    // The counter stays consistent across a panic, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.reserved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WorkerQuota {
    fn default() -> Self {
        Self::from_cpus()
    }
}
