use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const DEFAULT_REASON: &str = "operation cancelled";
const DEADLINE_REASON: &str = "deadline exceeded";

/// External cancellation signal polled by workers between items
pub trait CancelSignal: Sync {
    /// Whether the operation should stop
    fn is_cancelled(&self) -> bool;

    /// Human readable reason, meaningful once `is_cancelled` returns true
    fn reason(&self) -> String;
}

/// A signal that is never active
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl CancelSignal for Never {
    fn is_cancelled(&self) -> bool {
        false
    }

    fn reason(&self) -> String {
        String::new()
    }
}

/// Shareable cancellation token with optional deadline
///
/// Wraps a [`CancellationToken`] so async tasks can await the same signal that
/// worker threads poll. Clones observe the same state. A timeout is just a
/// deadline after which the token reports itself as cancelled; nothing is
/// interrupted mid-item.
#[derive(Debug, Clone)]
pub struct CancelToken {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    fn build(deadline: Option<Instant>) -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            deadline,
        }
    }

    /// Cancel the token. The first reason supplied is the one reported.
    pub fn cancel(&self, reason: impl Into<String>) {
        // Reason is stored before the token flips so observers always see it.
        let _ = self.reason.set(reason.into());
        if !self.token.is_cancelled() {
            self.token.cancel();
            tracing::debug!("Cancellation requested: {}", self.reason());
        }
    }

    /// The underlying token, for `select!` against async work.
    ///
    /// Cancelling it directly reports the default reason.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal for CancelToken {
    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline_passed()
    }

    fn reason(&self) -> String {
        if self.token.is_cancelled() {
            return self
                .reason
                .get()
                .cloned()
                .unwrap_or_else(|| DEFAULT_REASON.to_string());
        }
        if self.deadline_passed() {
            return DEADLINE_REASON.to_string();
        }
        String::new()
    }
}

impl<S: CancelSignal + ?Sized> CancelSignal for &S {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn reason(&self) -> String {
        (**self).reason()
    }
}
