//! The future purgatory.
//!
//! A [`Purgatory`] holds deferred results until one of two things happens:
//!
//! - the application calls [`Purgatory::complete_all`], resolving every
//!   pending result with the same value, or
//! - the clock passes a result's deadline and the expiration sweep fails it
//!   with [`PurgatoryError::Timeout`].
//!
//! Each pending result moves `PENDING -> COMPLETED` or `PENDING -> EXPIRED`
//! exactly once. The purgatory does not track that state itself: it takes
//! entries out of its [`DeadlineIndex`] under a single lock, then relies on
//! the result's own resolve-once guard ([`DeferredResult`]) when resolving
//! them. Whichever removal path reaches the result second sees `false` and
//! does nothing.
//!
//! # Time
//!
//! Sweeps run whenever the clock moves:
//! - with a [`ManualClock`](crate::core::time::ManualClock), `advance` calls
//!   [`Purgatory::expire`] synchronously through [`TickListener`]
//! - with a [`SystemClock`](crate::core::time::SystemClock), an
//!   [`ExpirationDriver`](driver::ExpirationDriver) sleeps until the next
//!   deadline and sweeps
//!
//! # Selective completion
//!
//! Only bulk completion exists. Protocols that need to resolve a subset of
//! waiters (for example, every request whose log offset is now committed)
//! would add a predicate-based drain over [`DeadlineIndex::iter`] and
//! [`DeadlineIndex::remove`]; nothing here depends on that.

pub mod deferred;
pub mod driver;
pub mod index;

use crate::core::config::PurgatoryConfig;
use crate::core::error::PurgatoryError;
use crate::core::time::{Clock, Tick, TickListener};
use deferred::DeferredResult;
use index::{DeadlineIndex, DeadlineKey};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;

/// A registered deferred result. Its deadline and sequence live in the
/// [`DeadlineKey`] it is indexed under.
pub(crate) struct PendingEntry<V> {
    result: Box<dyn DeferredResult<V>>,
    /// Timeout the entry was registered with, after clamping.
    timeout_ms: u64,
}

struct PendingState<V> {
    index: DeadlineIndex<PendingEntry<V>>,
    next_sequence: u64,
}

/// Registry of deferred results awaiting completion or timeout.
pub struct Purgatory<V> {
    clock: Arc<dyn Clock>,
    pending: Mutex<PendingState<V>>,
    max_timeout_ms: u64,
    /// Raised when a registration becomes the earliest deadline.
    schedule_changed: Notify,
    stats: PurgatoryStats,
}

impl<V> Purgatory<V>
where
    V: Clone + Send + 'static,
{
    /// Create a purgatory with default limits, subscribed to `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_config(clock, &PurgatoryConfig::default())
    }

    /// Create a purgatory with the given limits, subscribed to `clock`.
    pub fn with_config(clock: Arc<dyn Clock>, config: &PurgatoryConfig) -> Arc<Self> {
        let purgatory = Arc::new(Self {
            clock,
            pending: Mutex::new(PendingState {
                index: DeadlineIndex::new(),
                next_sequence: 0,
            }),
            max_timeout_ms: config.max_timeout_ms,
            schedule_changed: Notify::new(),
            stats: PurgatoryStats::new(),
        });
        let weak = Arc::downgrade(&purgatory);
        let listener: Weak<dyn TickListener> = weak;
        purgatory.clock.subscribe(listener);
        purgatory
    }

    /// Register `result` to be completed, or failed after `timeout_ms`.
    ///
    /// A zero timeout makes the entry eligible on the next sweep. A result
    /// that is already resolved is not registered.
    pub fn await_result<R>(&self, result: R, timeout_ms: u64)
    where
        R: DeferredResult<V> + 'static,
    {
        if result.is_resolved() {
            self.stats.skipped_resolved.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("deferred result already resolved; not registering");
            return;
        }

        let timeout_ms = self.clamp_timeout(timeout_ms);
        let deadline = self.clock.now().saturating_add_ms(timeout_ms);

        let (sequence, earliest) = {
            let mut pending = self.pending.lock();
            let sequence = pending.next_sequence;
            pending.next_sequence += 1;
            let earliest = pending
                .index
                .next_deadline()
                .map_or(true, |next| deadline < next);
            pending.index.insert(
                DeadlineKey { deadline, sequence },
                PendingEntry {
                    result: Box::new(result),
                    timeout_ms,
                },
            );
            (sequence, earliest)
        };

        self.stats.awaited.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%deadline, timeout_ms, sequence, "registered deferred result");

        if earliest {
            self.schedule_changed.notify_one();
        }
    }

    /// Complete every pending result with `value`.
    ///
    /// The pending set is captured and cleared under the lock; results are
    /// resolved after it is released, in unspecified order. Registrations that
    /// race with this call may be left for the next call or their deadline.
    ///
    /// Returns how many results this call resolved.
    pub fn complete_all(&self, value: V) -> usize {
        let captured = self.pending.lock().index.drain();
        let total = captured.len();

        let mut completed = 0;
        for (key, entry) in captured {
            if entry.result.try_complete(value.clone()) {
                completed += 1;
            } else {
                tracing::trace!(sequence = key.sequence, "result resolved elsewhere");
            }
        }

        self.record_resolutions(&self.stats.completed, completed, total);
        tracing::debug!(captured = total, completed, "completed pending results");
        completed
    }

    /// Fail every entry whose deadline is at or before `now`.
    ///
    /// Entries are failed in deadline order, ties by registration order.
    /// Returns how many results this sweep resolved.
    pub fn expire(&self, now: Tick) -> usize {
        let due = self.pending.lock().index.pop_due(now);
        if due.is_empty() {
            return 0;
        }
        let total = due.len();

        let mut expired = 0;
        for (key, entry) in due {
            let error = PurgatoryError::timeout(entry.timeout_ms, key.deadline);
            if entry.result.try_fail(error) {
                expired += 1;
            } else {
                tracing::trace!(sequence = key.sequence, "result resolved before expiry");
            }
        }

        self.record_resolutions(&self.stats.expired, expired, total);
        tracing::debug!(%now, due = total, expired, "expiration sweep");
        expired
    }

    fn clamp_timeout(&self, timeout_ms: u64) -> u64 {
        if timeout_ms > self.max_timeout_ms {
            tracing::warn!(
                requested_ms = timeout_ms,
                max_ms = self.max_timeout_ms,
                "timeout above maximum; clamping"
            );
            self.max_timeout_ms
        } else {
            timeout_ms
        }
    }
}

impl<V> Purgatory<V> {
    /// Number of indexed results that are still unresolved.
    ///
    /// Results resolved by their owner stay indexed until completion or
    /// their deadline, but are not counted. Asks every indexed result
    /// [`DeferredResult::is_resolved`] while holding the index lock.
    pub fn num_waiting(&self) -> usize {
        self.pending
            .lock()
            .index
            .iter()
            .filter(|(_, entry)| !entry.result.is_resolved())
            .count()
    }

    /// Number of indexed entries, resolved or not.
    pub fn num_indexed(&self) -> usize {
        self.pending.lock().index.len()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Tick> {
        self.pending.lock().index.next_deadline()
    }

    /// The clock deadlines are computed against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PurgatoryStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn schedule_changed(&self) -> &Notify {
        &self.schedule_changed
    }

    fn record_resolutions(&self, counter: &AtomicU64, resolved: usize, total: usize) {
        counter.fetch_add(resolved as u64, Ordering::Relaxed);
        self.stats
            .already_resolved
            .fetch_add((total - resolved) as u64, Ordering::Relaxed);
    }
}

impl<V> TickListener for Purgatory<V>
where
    V: Clone + Send + 'static,
{
    fn on_tick(&self, now: Tick) {
        self.expire(now);
    }
}

impl<V> std::fmt::Debug for Purgatory<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Purgatory")
            .field("indexed", &self.num_indexed())
            .field("max_timeout_ms", &self.max_timeout_ms)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Statistics
// ============================================================================

struct PurgatoryStats {
    awaited: AtomicU64,
    skipped_resolved: AtomicU64,
    completed: AtomicU64,
    expired: AtomicU64,
    already_resolved: AtomicU64,
}

impl PurgatoryStats {
    fn new() -> Self {
        Self {
            awaited: AtomicU64::new(0),
            skipped_resolved: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            already_resolved: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> PurgatoryStatsSnapshot {
        PurgatoryStatsSnapshot {
            awaited: self.awaited.load(Ordering::Relaxed),
            skipped_resolved: self.skipped_resolved.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            already_resolved: self.already_resolved.load(Ordering::Relaxed),
        }
    }
}

/// Purgatory counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgatoryStatsSnapshot {
    /// Results registered.
    pub awaited: u64,
    /// Registrations skipped because the result was already resolved.
    pub skipped_resolved: u64,
    /// Results resolved by bulk completion.
    pub completed: u64,
    /// Results failed by an expiration sweep.
    pub expired: u64,
    /// Removed entries whose result had been resolved elsewhere.
    pub already_resolved: u64,
}
