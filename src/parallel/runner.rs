use crossbeam::sync::WaitGroup;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::cancel::CancelSignal;
use super::quota::WorkerQuota;

/// Errors returned directly by [`TaskRunner::run`]
///
/// Failures from the per-item function are not reported here; see
/// [`TaskRunner::has_error`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("operation cancelled: {message}")]
    Cancelled { message: String },

    /// Only observable when panics unwind; the release profile sets
    /// `panic = "abort"`, which terminates the process instead.
    #[error("worker thread panicked during parallel execution")]
    WorkerPanicked,

    #[error("task runner has already been run")]
    AlreadyRan,
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }
}

/// Runs a per-index function over `0..item_count` on a fixed set of workers
///
/// The worker count is negotiated with the shared [`WorkerQuota`] once, at
/// construction. A runner is single use.
pub struct TaskRunner {
    quota: Arc<WorkerQuota>,
    workers: usize,
    item_count: usize,
    /// Quota releases still owed, `workers - 1` at construction
    releasable: Mutex<usize>,
    /// Lock-free hint for the hot loop, set after `error` is written
    failed: AtomicBool,
    error: Mutex<Option<anyhow::Error>>,
    started: AtomicBool,
}

/// Marks its worker done when dropped, so a panicking item still releases quota
/// and the barrier.
struct WorkerGuard<'a> {
    runner: &'a TaskRunner,
    done: Option<WaitGroup>,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            self.runner.mark_worker_done(done);
        }
    }
}

impl TaskRunner {
    pub fn new(quota: Arc<WorkerQuota>, item_count: usize, min_per_worker_override: usize) -> Self {
        let workers = quota.reserve(item_count, min_per_worker_override);
        Self::with_workers(quota, workers, item_count)
    }

    fn with_workers(quota: Arc<WorkerQuota>, workers: usize, item_count: usize) -> Self {
        Self {
            quota,
            workers,
            item_count,
            releasable: Mutex::new(workers - 1),
            failed: AtomicBool::new(false),
            error: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Half-open index range assigned to `worker_index`
    ///
    /// Every worker but the last gets `item_count / workers` items; the last one
    /// also takes the remainder. Workers whose start lies past the end, and indices
    /// outside `0..worker_count()`, get `0..0`.
    pub fn partition_range(&self, worker_index: usize) -> Range<usize> {
        if worker_index >= self.workers {
            return 0..0;
        }

        let chunk = self.item_count / self.workers;
        let start = worker_index * chunk;

        if start >= self.item_count {
            return 0..0;
        }

        let end = if worker_index == self.workers - 1 {
            self.item_count
        } else {
            (worker_index + 1) * chunk
        };
        start..end
    }

    /// Process every partition concurrently and wait for all workers
    ///
    /// Before each item a worker checks whether a failure was already recorded or
    /// `cancel` is active, and stops its partition if so. An item that has started
    /// always runs to completion.
    ///
    /// Returns `Err(RunError::Cancelled)` when `cancel` is active after the join.
    /// Otherwise returns `Ok(())` even if an item failed; check
    /// [`has_error`](Self::has_error) afterwards.
    pub fn run<C, F>(&self, cancel: &C, f: F) -> Result<(), RunError>
    where
        C: CancelSignal + ?Sized,
        F: Fn(usize) -> anyhow::Result<()> + Sync,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(RunError::AlreadyRan);
        }

        let f = &f;
        let barrier = WaitGroup::new();

        let joined = crossbeam::thread::scope(|s| {
            for worker_index in 0..self.workers {
                let guard = WorkerGuard {
                    runner: self,
                    done: Some(barrier.clone()),
                };
                s.spawn(move |_| {
                    let _guard = guard;
                    self.process_partition(worker_index, cancel, f);
                });
            }
            barrier.wait();
        });

        if cancel.is_cancelled() {
            let message = cancel.reason();
            tracing::warn!("Parallel run over {} items cancelled: {}", self.item_count, message);
            return Err(RunError::Cancelled { message });
        }

        if joined.is_err() {
            tracing::warn!("Worker panicked while processing {} items", self.item_count);
            return Err(RunError::WorkerPanicked);
        }

        tracing::debug!(
            "Parallel run finished: {} items, {} worker(s), failed: {}",
            self.item_count,
            self.workers,
            self.has_error()
        );
        Ok(())
    }

    fn process_partition<C, F>(&self, worker_index: usize, cancel: &C, f: &F)
    where
        C: CancelSignal + ?Sized,
        F: Fn(usize) -> anyhow::Result<()>,
    {
        let range = self.partition_range(worker_index);
        tracing::trace!("worker-{} processing {:?}", worker_index, range);

        for index in range {
            if self.has_error() || cancel.is_cancelled() {
                break;
            }
            if let Err(err) = f(index) {
                self.set_error(err);
                break;
            }
        }
    }

    /// Leave the barrier and return one extra slot to the quota while any are owed.
    fn mark_worker_done(&self, done: WaitGroup) {
        {
            let mut releasable = self.releasable_slots();
            if *releasable > 0 {
                *releasable -= 1;
                self.quota.release();
            }
        }
        drop(done);
    }

    fn releasable_slots(&self) -> MutexGuard<'_, usize> {
        self.releasable.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Concurrent failures overwrite each other; one of them survives.
    fn set_error(&self, err: anyhow::Error) {
        *self.error_slot() = Some(err);
        self.failed.store(true, Ordering::Release);
    }

    pub fn has_error(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Rendered message of the recorded failure, including its context chain
    pub fn err(&self) -> Option<String> {
        self.error_slot().as_ref().map(|err| format!("{err:#}"))
    }

    /// Move the recorded failure out for propagation with `?`
    ///
    /// Clears [`has_error`](Self::has_error) as well, so the runner no longer
    /// reports a failure it has handed away.
    pub fn take_error(&self) -> Option<anyhow::Error> {
        let mut slot = self.error_slot();
        let taken = slot.take();
        if taken.is_some() {
            self.failed.store(false, Ordering::Release);
        }
        taken
    }

    fn error_slot(&self) -> MutexGuard<'_, Option<anyhow::Error>> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// A runner dropped without running still holds its extra slots.
impl Drop for TaskRunner {
    fn drop(&mut self) {
        let mut releasable = self.releasable_slots();
        while *releasable > 0 {
            *releasable -= 1;
            self.quota.release();
        }
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("workers", &self.workers)
            .field("item_count", &self.item_count)
            .field("failed", &self.has_error())
            .finish()
    }
}
