//! Deferred results and their completion capability.
//!
//! The purgatory only ever sees a [`DeferredResult`]: something it can try to
//! complete or fail exactly once. Two implementations are provided:
//!
//! - [`Promise`] - a cloneable write-once cell with async [`Promise::wait`]
//! - [`OneshotCompleter`] - the sending half of a `tokio::sync::oneshot`
//!   channel, created with [`channel`]

use crate::core::error::{PurgatoryError, PurgatoryResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

/// Write-once completion capability.
///
/// Both `try_` methods succeed only for the first resolution. Every later call,
/// from either method, returns `false` and has no effect. This is the only
/// guard between the completion and expiration paths.
///
/// The purgatory calls `try_complete` and `try_fail` after releasing its
/// index lock, so they may re-enter it (a timeout handler can register a
/// retry). [`is_resolved`](DeferredResult::is_resolved) is also called under
/// that lock by [`Purgatory::num_waiting`](super::Purgatory::num_waiting) and
/// must not call back into the purgatory; it should be a cheap state read.
pub trait DeferredResult<V>: Send + Sync {
    /// Resolve with a value. Returns whether this call resolved the result.
    fn try_complete(&self, value: V) -> bool;

    /// Resolve with an error. Returns whether this call resolved the result.
    fn try_fail(&self, error: PurgatoryError) -> bool;

    /// Whether the result has already been resolved by anyone.
    ///
    /// Must not block or touch the purgatory that holds this result.
    fn is_resolved(&self) -> bool;
}

impl<V, T> DeferredResult<V> for Arc<T>
where
    T: DeferredResult<V> + ?Sized,
{
    fn try_complete(&self, value: V) -> bool {
        (**self).try_complete(value)
    }

    fn try_fail(&self, error: PurgatoryError) -> bool {
        (**self).try_fail(error)
    }

    fn is_resolved(&self) -> bool {
        (**self).is_resolved()
    }
}

// ============================================================================
// Promise
// ============================================================================

/// Cloneable write-once result cell.
///
/// Clones share the same cell: hand one clone to the purgatory and keep
/// another to observe the outcome.
pub struct Promise<V> {
    inner: Arc<PromiseInner<V>>,
}

struct PromiseInner<V> {
    outcome: Mutex<Option<PurgatoryResult<V>>>,
    resolved: Notify,
}

impl<V> Promise<V> {
    /// Create an unresolved promise.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                outcome: Mutex::new(None),
                resolved: Notify::new(),
            }),
        }
    }

    /// Create a promise that is already completed with `value`.
    pub fn completed(value: V) -> Self {
        let promise = Self::new();
        promise.complete(value);
        promise
    }

    /// Complete with a value if unresolved.
    pub fn complete(&self, value: V) -> bool {
        self.resolve(Ok(value))
    }

    /// Fail with an error if unresolved.
    pub fn fail(&self, error: PurgatoryError) -> bool {
        self.resolve(Err(error))
    }

    /// Cancel from the owner's side if unresolved.
    pub fn cancel(&self) -> bool {
        self.resolve(Err(PurgatoryError::Cancelled))
    }

    /// Whether the promise has been resolved.
    pub fn is_done(&self) -> bool {
        self.inner.outcome.lock().is_some()
    }

    /// Whether the promise was resolved by [`cancel`](Self::cancel).
    pub fn is_cancelled(&self) -> bool {
        matches!(
            *self.inner.outcome.lock(),
            Some(Err(PurgatoryError::Cancelled))
        )
    }

    fn resolve(&self, outcome: PurgatoryResult<V>) -> bool {
        {
            let mut slot = self.inner.outcome.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
        }
        self.inner.resolved.notify_waiters();
        true
    }
}

impl<V: Clone> Promise<V> {
    /// The outcome, if resolved.
    pub fn outcome(&self) -> Option<PurgatoryResult<V>> {
        self.inner.outcome.lock().clone()
    }

    /// Wait until the promise is resolved.
    pub async fn wait(&self) -> PurgatoryResult<V> {
        loop {
            // Register before checking so a resolution in between is not lost.
            let notified = self.inner.resolved.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }
}

impl<V> Clone for Promise<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for Promise<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Promise<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("done", &self.is_done())
            .finish()
    }
}

impl<V: Send> DeferredResult<V> for Promise<V> {
    fn try_complete(&self, value: V) -> bool {
        self.complete(value)
    }

    fn try_fail(&self, error: PurgatoryError) -> bool {
        self.fail(error)
    }

    fn is_resolved(&self) -> bool {
        self.is_done()
    }
}

// ============================================================================
// Oneshot bridge
// ============================================================================

/// Sending half of a oneshot channel, usable as a [`DeferredResult`].
///
/// A dropped receiver counts as resolved: nobody is left to observe the
/// outcome, so both removal paths skip it.
pub struct OneshotCompleter<V> {
    sender: Mutex<Option<oneshot::Sender<PurgatoryResult<V>>>>,
}

/// Create a completer and the receiver that observes its outcome.
pub fn channel<V>() -> (OneshotCompleter<V>, oneshot::Receiver<PurgatoryResult<V>>) {
    let (tx, rx) = oneshot::channel();
    (
        OneshotCompleter {
            sender: Mutex::new(Some(tx)),
        },
        rx,
    )
}

impl<V> OneshotCompleter<V> {
    fn send(&self, outcome: PurgatoryResult<V>) -> bool {
        match self.sender.lock().take() {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

impl<V> std::fmt::Debug for OneshotCompleter<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneshotCompleter")
            .field("open", &self.sender.lock().is_some())
            .finish()
    }
}

impl<V: Send> DeferredResult<V> for OneshotCompleter<V> {
    fn try_complete(&self, value: V) -> bool {
        self.send(Ok(value))
    }

    fn try_fail(&self, error: PurgatoryError) -> bool {
        self.send(Err(error))
    }

    fn is_resolved(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map_or(true, oneshot::Sender::is_closed)
    }
}
