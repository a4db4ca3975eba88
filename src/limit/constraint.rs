//! Single capacity-per-interval admission constraint.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use super::pool::PermitPool;
use crate::error::{Result, TurnstileError};

/// A single "at most `capacity` admissions per `interval`" rule.
///
/// The constraint owns its [`PermitPool`] exclusively; nothing else mutates
/// the pool besides the pool's own release timers. Permits regenerate on a
/// rolling timer per acquisition, not on wall-clock window boundaries.
pub struct IntervalConstraint {
    /// The permit pool backing this constraint
    pool: Arc<PermitPool>,
}

impl IntervalConstraint {
    /// Create a new constraint allowing `capacity` admissions per `interval`.
    ///
    /// Returns [`TurnstileError::InvalidConstraint`] if `capacity` or
    /// `interval` is zero.
    pub fn new(capacity: u64, interval: Duration) -> Result<Self> {
        if capacity == 0 {
            return Err(TurnstileError::InvalidConstraint(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if interval.is_zero() {
            return Err(TurnstileError::InvalidConstraint(
                "interval must be greater than zero".to_string(),
            ));
        }

        debug!(capacity, interval_ms = interval.as_millis() as u64, "Creating interval constraint");

        Ok(Self {
            pool: PermitPool::new(capacity, interval),
        })
    }

    /// Wait for a permit, or bail out when `cancel` resolves first.
    ///
    /// On success the permit's release is already scheduled on the pool's
    /// timer; the caller has nothing to clean up, whatever happens
    /// downstream. On cancellation the waiter is dropped from the pool's
    /// wake queue without taking a permit.
    pub(crate) async fn acquire<C>(&self, mut cancel: C) -> Result<()>
    where
        C: Future<Output = ()> + Unpin,
    {
        loop {
            if self.pool.try_acquire() {
                PermitPool::schedule_release(&self.pool);
                return Ok(());
            }

            // Register for the next release before re-checking, so a permit
            // returned between the failed attempt and the registration
            // still wakes us.
            let released = self.pool.released();
            tokio::pin!(released);
            released.as_mut().enable();

            if self.pool.try_acquire() {
                PermitPool::schedule_release(&self.pool);
                return Ok(());
            }

            trace!(
                capacity = self.pool.capacity(),
                "Pool exhausted, parking waiter"
            );

            tokio::select! {
                _ = &mut cancel => {
                    debug!(capacity = self.pool.capacity(), "Admission wait canceled");
                    return Err(TurnstileError::Canceled);
                }
                _ = &mut released => {}
            }
        }
    }

    /// Get the number of admissions this constraint allows per interval.
    pub fn capacity(&self) -> u64 {
        self.pool.capacity()
    }

    /// Get the interval over which admissions are counted.
    pub fn interval(&self) -> Duration {
        self.pool.interval()
    }

    /// Get the number of permits currently available.
    pub(crate) fn available(&self) -> u64 {
        self.pool.available()
    }
}

impl std::fmt::Debug for IntervalConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalConstraint")
            .field("capacity", &self.capacity())
            .field("interval", &self.interval())
            .field("available", &self.available())
            .finish()
    }
}
