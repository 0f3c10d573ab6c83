//! Signals surfaced to the UI layer: the backend-starting flag and user notices.
//!
//! # Design
//! - The flag lives in a `watch` channel so any number of views can observe it.
//! - Delayed clears carry the generation that raised the flag, so a stale clear
//!   never hides a newer cold-start signal.
//! - User-facing notices go through the [`Notifier`] seam; the core never renders.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

/// Observable "the backend may be waking up" flag.
#[derive(Clone, Debug)]
pub struct BackendStatus {
    inner: Arc<BackendStatusInner>,
}

#[derive(Debug)]
struct BackendStatusInner {
    starting: watch::Sender<bool>,
    generation: AtomicU64,
}

/// Token returned by [`BackendStatus::mark_starting`] identifying that signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartingSignal(u64);

impl Default for BackendStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendStatus {
    /// Create a status handle with the flag lowered.
    #[must_use]
    pub fn new() -> Self {
        let (starting, _) = watch::channel(false);
        Self {
            inner: Arc::new(BackendStatusInner {
                starting,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current flag value.
    #[must_use]
    pub fn is_starting(&self) -> bool {
        *self.inner.starting.borrow()
    }

    /// Subscribe to flag transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.starting.subscribe()
    }

    /// Raise the flag and return the signal that raised it.
    pub fn mark_starting(&self) -> StartingSignal {
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.starting.send_if_modified(|value| {
            let changed = !*value;
            *value = true;
            changed
        });
        tracing::info!(generation, "backend appears to be starting");
        StartingSignal(generation)
    }

    /// Lower the flag immediately, regardless of who raised it.
    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.lower();
    }

    /// Lower the flag after `settle`, unless a newer signal was raised meanwhile.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn clear_after(&self, signal: StartingSignal, settle: Duration) {
        let status = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            status.release(signal);
        });
    }

    /// Lower the flag now if `signal` is still the latest one raised.
    pub fn release(&self, signal: StartingSignal) {
        if self.inner.generation.load(Ordering::Acquire) == signal.0 {
            self.lower();
        }
    }

    fn lower(&self) {
        self.inner.starting.send_if_modified(|value| {
            let changed = *value;
            *value = false;
            changed
        });
    }
}

/// Blocking notices and reload requests consumed by the UI.
pub trait Notifier: Send + Sync {
    /// Show a user-facing notice that must be acknowledged.
    fn alert(&self, message: &str);

    /// Discard all client state and start over (e.g. return to the login view).
    fn reload(&self);
}

/// [`Notifier`] that only writes to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!(message, "user notice");
    }

    fn reload(&self) {
        tracing::info!("client reload requested");
    }
}
