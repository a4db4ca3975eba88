//! Permit pool implementation.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::trace;

/// A fixed-capacity pool of admission permits refreshed on rolling timers.
///
/// Every successful acquisition is matched by exactly one release scheduled
/// `interval` after the decrement. The timer owns the release: it fires
/// whether or not the acquiring caller is still around, so a pool can never
/// be starved by an abandoned acquisition.
pub(crate) struct PermitPool {
    /// Maximum number of permits in the pool
    capacity: u64,
    /// Delay between a permit being taken and it returning to the pool
    interval: Duration,
    /// Permits currently available, always within `[0, capacity]`
    available: Mutex<u64>,
    /// Signaled whenever a permit returns to the pool
    released: Notify,
}

impl PermitPool {
    /// Create a new pool, initially full.
    pub fn new(capacity: u64, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            interval,
            available: Mutex::new(capacity),
            released: Notify::new(),
        })
    }

    /// Take one permit if any are available.
    ///
    /// Returns `true` and decrements the pool iff a permit was free;
    /// otherwise returns `false` with no side effect.
    pub fn try_acquire(&self) -> bool {
        let mut available = self.available.lock();
        if *available == 0 {
            return false;
        }
        *available -= 1;
        trace!(
            available = *available,
            capacity = self.capacity,
            "Permit taken"
        );
        true
    }

    /// Return one permit to the pool and wake parked waiters.
    ///
    /// A count already at capacity means an acquisition released twice,
    /// which the accounting is built to rule out, so it fails loudly rather
    /// than clamping.
    pub fn release(&self) {
        {
            let mut available = self.available.lock();
            assert!(
                *available < self.capacity,
                "permit pool over-released: {} permits at capacity {}",
                *available,
                self.capacity
            );
            *available += 1;
            trace!(
                available = *available,
                capacity = self.capacity,
                "Permit returned"
            );
        }
        self.released.notify_waiters();
    }

    /// Arrange exactly one [`release`](Self::release) to fire `interval`
    /// from now, on a timer task independent of the caller.
    pub fn schedule_release(pool: &Arc<Self>) {
        let pool = Arc::clone(pool);
        tokio::spawn(async move {
            tokio::time::sleep(pool.interval).await;
            pool.release();
        });
    }

    /// Register interest in the next release.
    ///
    /// The returned future must be `enable`d before re-checking the pool so
    /// a release landing between the failed attempt and the registration is
    /// not lost.
    pub fn released(&self) -> Notified<'_> {
        self.released.notified()
    }

    /// Get the pool's capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get the refresh interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Get the current number of available permits.
    pub fn available(&self) -> u64 {
        *self.available.lock()
    }
}
