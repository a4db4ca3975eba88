//! Multi-constraint composition and the awaitable admission façade.

use std::future::{pending, Future};

use tokio::time::Instant;
use tracing::{debug, trace};

use super::constraint::IntervalConstraint;
use crate::error::Result;

/// A conjunction of interval constraints: one admission must satisfy all of
/// them.
///
/// Constraints are acquired strictly in the order given to
/// [`compose`](Self::compose). The order is fixed for the limiter's lifetime
/// and is significant under contention: it decides which constraint a waiter
/// blocks on first, and a single global order is what rules out circular
/// waits between callers. It does not affect permit accounting.
///
/// The limiter itself holds no mutable state, so one instance can be shared
/// (`Arc`) across any number of concurrent callers with no extra locking.
pub struct CompositeLimiter {
    /// The constraints, in acquisition order
    constraints: Vec<IntervalConstraint>,
}

/// Receipt for a granted admission.
///
/// Holds one permit per constraint in the composite. Every permit's release
/// was already scheduled on its pool's timer at acquisition, so the ticket
/// carries no cleanup duty; dropping it does nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionTicket {
    /// Number of permits held, one per constraint
    permits: usize,
    /// When the admission was granted
    granted_at: Instant,
}

impl AdmissionTicket {
    /// Get the number of permits this admission took, one per constraint.
    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Get the instant the admission was granted.
    pub fn granted_at(&self) -> Instant {
        self.granted_at
    }
}

impl CompositeLimiter {
    /// Create a limiter from constraints in acquisition order.
    ///
    /// An empty composite admits unconditionally.
    pub fn compose(constraints: impl IntoIterator<Item = IntervalConstraint>) -> Self {
        let constraints: Vec<_> = constraints.into_iter().collect();
        debug!(constraints = constraints.len(), "Composing limiter");
        Self { constraints }
    }

    /// Get the constraints in acquisition order.
    pub fn constraints(&self) -> &[IntervalConstraint] {
        &self.constraints
    }

    /// Wait until every constraint grants a permit.
    ///
    /// This is the bare façade form: awaiting it is the admission. It is
    /// reusable — each call is one independent admission.
    pub async fn admit(&self) -> AdmissionTicket {
        match self.admit_until(pending::<()>()).await {
            Ok(ticket) => ticket,
            Err(_) => unreachable!("admission without a cancellation cannot be canceled"),
        }
    }

    /// Wait until every constraint grants a permit, or until `cancel`
    /// resolves, whichever comes first.
    ///
    /// Acquisition is all-or-nothing with respect to the caller: on
    /// cancellation partway through, no ticket is produced and
    /// [`TurnstileError::Canceled`](crate::TurnstileError::Canceled) is
    /// returned. Constraints that had already granted keep their decrements
    /// and their scheduled timer releases, so their pools return to the
    /// prior count within their own intervals with no rollback and no leak.
    pub async fn admit_until<C>(&self, cancel: C) -> Result<AdmissionTicket>
    where
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        for (index, constraint) in self.constraints.iter().enumerate() {
            trace!(index, "Acquiring constraint");
            if let Err(err) = constraint.acquire(cancel.as_mut()).await {
                debug!(
                    already_granted = index,
                    "Composite admission canceled; granted permits self-release on their timers"
                );
                return Err(err);
            }
        }

        debug!(permits = self.constraints.len(), "Admission granted");
        Ok(AdmissionTicket {
            permits: self.constraints.len(),
            granted_at: Instant::now(),
        })
    }

    /// Admit, then run `work`.
    ///
    /// No limiter state is held while `work` runs; the only cost of the
    /// admission is the already-decremented pool counts. `work`'s output,
    /// including any error it produces, is returned verbatim.
    pub async fn enqueue<F, Fut>(&self, work: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _ticket = self.admit().await;
        work().await
    }

    /// Admit under a cancellation, then run `work`.
    ///
    /// `cancel` bounds the admission wait only; once `work` starts it is not
    /// interrupted by this limiter.
    pub async fn enqueue_until<F, Fut, C>(&self, work: F, cancel: C) -> Result<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
        C: Future<Output = ()>,
    {
        let _ticket = self.admit_until(cancel).await?;
        Ok(work().await)
    }
}

impl From<IntervalConstraint> for CompositeLimiter {
    fn from(constraint: IntervalConstraint) -> Self {
        Self::compose([constraint])
    }
}

impl std::fmt::Debug for CompositeLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeLimiter")
            .field("constraints", &self.constraints)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TurnstileError;
    use std::time::Duration;

    fn constraint(capacity: u64, interval: Duration) -> IntervalConstraint {
        IntervalConstraint::new(capacity, interval).unwrap()
    }

    #[tokio::test]
    async fn test_compose_preserves_order() {
        let limiter = CompositeLimiter::compose([
            constraint(1, Duration::from_secs(1)),
            constraint(10, Duration::from_secs(60)),
        ]);

        assert_eq!(limiter.constraints().len(), 2);
        assert_eq!(limiter.constraints()[0].capacity(), 1);
        assert_eq!(limiter.constraints()[1].capacity(), 10);
    }

    #[tokio::test]
    async fn test_admit_takes_one_permit_per_constraint() {
        let limiter = CompositeLimiter::compose([
            constraint(3, Duration::from_secs(60)),
            constraint(5, Duration::from_secs(60)),
        ]);

        let ticket = limiter.admit().await;

        assert_eq!(ticket.permits(), 2);
        assert_eq!(limiter.constraints()[0].available(), 2);
        assert_eq!(limiter.constraints()[1].available(), 4);
    }

    #[tokio::test]
    async fn test_empty_composite_admits_unconditionally() {
        let limiter = CompositeLimiter::compose([]);

        let ticket = limiter.admit().await;
        assert_eq!(ticket.permits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_midway_leaks_no_permit() {
        let limiter = CompositeLimiter::compose([
            constraint(2, Duration::from_secs(1)),
            constraint(1, Duration::from_secs(1)),
        ]);

        // First admission drains the second constraint entirely.
        limiter.admit().await;

        // Second caller gets the first constraint's remaining permit, then
        // blocks on the exhausted second constraint until its deadline.
        let result = limiter
            .admit_until(tokio::time::sleep(Duration::from_millis(100)))
            .await;
        assert_eq!(result, Err(TurnstileError::Canceled));

        assert_eq!(limiter.constraints()[0].available(), 0);
        assert_eq!(limiter.constraints()[1].available(), 0);

        // Every decremented pool self-heals within its own interval of its
        // own acquisition, canceled admission included.
        tokio::time::sleep(Duration::from_millis(950)).await;
        assert_eq!(limiter.constraints()[0].available(), 2);
        assert_eq!(limiter.constraints()[1].available(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_returns_work_output() {
        let limiter = CompositeLimiter::from(constraint(5, Duration::from_secs(1)));

        let value = limiter.enqueue(|| async { 41 + 1 }).await;
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_enqueue_propagates_work_failure_verbatim() {
        let limiter = CompositeLimiter::from(constraint(5, Duration::from_secs(1)));

        let result: std::result::Result<(), &str> =
            limiter.enqueue(|| async { Err("downstream on fire") }).await;
        assert_eq!(result, Err("downstream on fire"));

        // The failed work still consumed its admission.
        assert_eq!(limiter.constraints()[0].available(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_until_bounds_the_wait_not_the_work() {
        let limiter = CompositeLimiter::from(constraint(1, Duration::from_secs(10)));
        limiter.admit().await;

        let result = limiter
            .enqueue_until(
                || async { "ran" },
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await;
        assert_eq!(result, Err(TurnstileError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_facade_is_reusable_at_constraint_throughput() {
        let limiter = CompositeLimiter::from(constraint(2, Duration::from_secs(1)));

        let start = tokio::time::Instant::now();
        for _ in 0..6 {
            limiter.admit().await;
        }

        // Two immediate grants, then two more per elapsed second.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }
}
