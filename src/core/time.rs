//! Clock abstraction and millisecond ticks.
//!
//! All deadline arithmetic in the purgatory is done in [`Tick`]s read from a
//! [`Clock`]. Two clocks are provided:
//! - [`SystemClock`] - monotonic time, paired with the background
//!   [`ExpirationDriver`](crate::purgatory::driver::ExpirationDriver)
//! - [`ManualClock`] - time moves only on [`ManualClock::advance`], which runs
//!   every registered sweep before returning

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A point on a clock, in milliseconds since that clock's epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tick {
    /// Milliseconds since the clock's epoch.
    pub ms: u64,
}

impl Tick {
    /// The latest representable tick. Deadlines saturate here.
    pub const MAX: Tick = Tick { ms: u64::MAX };

    /// Create a new tick with the given millisecond value.
    pub const fn new(ms: u64) -> Self {
        Self { ms }
    }

    /// Create a tick representing zero (epoch start).
    pub const fn zero() -> Self {
        Self { ms: 0 }
    }

    /// Add milliseconds to this tick, saturating at [`Tick::MAX`].
    pub const fn saturating_add_ms(self, ms: u64) -> Self {
        Self {
            ms: self.ms.saturating_add(ms),
        }
    }

    /// Check if this tick is at or after the given deadline.
    pub const fn is_at_or_after(self, deadline: Tick) -> bool {
        self.ms >= deadline.ms
    }

    /// Milliseconds until a deadline.
    ///
    /// Returns 0 if the deadline has already passed.
    pub fn ms_until(self, deadline: Tick) -> u64 {
        deadline.ms.saturating_sub(self.ms)
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tick({}ms)", self.ms)
    }
}

/// Something that must react when a clock moves forward.
///
/// The purgatory implements this so a [`ManualClock`] can run its
/// expiration sweep synchronously.
pub trait TickListener: Send + Sync {
    /// Called after the clock has advanced to `now`.
    fn on_tick(&self, now: Tick);
}

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    /// Current time on this clock.
    fn now(&self) -> Tick;

    /// Register a listener to be driven by explicit advancement.
    ///
    /// Clocks that advance on their own ignore this; their listeners are
    /// driven by a background task instead.
    fn subscribe(&self, _listener: Weak<dyn TickListener>) {}
}

/// Production clock backed by `tokio::time::Instant`.
///
/// Reading tokio's instant (rather than `std`) keeps paused-time tests
/// deterministic.
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: tokio::time::Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is the moment of construction.
    pub fn new() -> Self {
        Self {
            epoch: tokio::time::Instant::now(),
        }
    }

    /// Convert a tick on this clock back to an instant.
    pub fn instant_at(&self, tick: Tick) -> tokio::time::Instant {
        self.epoch + std::time::Duration::from_millis(tick.ms)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Tick {
        let elapsed = self.epoch.elapsed().as_millis();
        Tick::new(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

/// Manually driven clock for deterministic tests.
///
/// [`advance`](ManualClock::advance) moves time forward and then calls every
/// live listener with the new time before returning.
pub struct ManualClock {
    now_ms: AtomicU64,
    listeners: Mutex<Vec<Weak<dyn TickListener>>>,
}

impl ManualClock {
    /// Create a clock starting at zero.
    pub fn new() -> Self {
        Self::starting_at(Tick::zero())
    }

    /// Create a clock starting at the given tick.
    pub fn starting_at(start: Tick) -> Self {
        Self {
            now_ms: AtomicU64::new(start.ms),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Create a shared clock starting at zero.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Move time forward by `ms` and run all due sweeps.
    pub fn advance(&self, ms: u64) {
        let previous = match self.now_ms.fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
            Some(now.saturating_add(ms))
        }) {
            Ok(previous) | Err(previous) => previous,
        };
        self.notify(Tick::new(previous.saturating_add(ms)));
    }

    /// Number of listeners that are still alive.
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.len()
    }

    fn notify(&self, now: Tick) {
        // Listeners run without the lock held so they may subscribe or read
        // the clock.
        let live: Vec<Arc<dyn TickListener>> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.on_tick(now);
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualClock")
            .field("now_ms", &self.now_ms.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick::new(self.now_ms.load(Ordering::Acquire))
    }

    fn subscribe(&self, listener: Weak<dyn TickListener>) {
        self.listeners.lock().push(listener);
    }
}
