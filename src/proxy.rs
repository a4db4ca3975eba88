//! Call interception: throttle an interface without touching its call sites.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::limit::CompositeLimiter;

/// A value paired with a limiter so every forwarded call is admitted first.
///
/// `Throttled` is the binding half of interface interception. The forwarding
/// half is a hand-written adapter per trait: implement the trait for
/// `Throttled<Impl>` and route each method body through [`call`](Self::call)
/// (or [`call_until`](Self::call_until) when the caller supplies a
/// cancellation). Only timing changes; return values and errors of the
/// wrapped call pass through untouched.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use turnstile::{CompositeLimiter, IntervalConstraint, Throttled};
///
/// #[async_trait]
/// trait Lookup {
///     async fn get(&self, key: &str) -> Option<String>;
/// }
///
/// struct Upstream;
///
/// #[async_trait]
/// impl Lookup for Upstream {
///     async fn get(&self, key: &str) -> Option<String> {
///         Some(key.to_uppercase())
///     }
/// }
///
/// #[async_trait]
/// impl Lookup for Throttled<Upstream> {
///     async fn get(&self, key: &str) -> Option<String> {
///         self.call(|upstream| upstream.get(key)).await
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = Arc::new(CompositeLimiter::from(
///     IntervalConstraint::new(5, Duration::from_millis(100)).unwrap(),
/// ));
/// let throttled = Throttled::wrap(Upstream, limiter);
/// assert_eq!(throttled.get("a").await, Some("A".to_string()));
/// # }
/// ```
pub struct Throttled<T> {
    /// The wrapped implementation
    inner: T,
    /// The limiter every forwarded call is admitted through
    limiter: Arc<CompositeLimiter>,
}

impl<T> Throttled<T> {
    /// Bind `inner` to `limiter`.
    pub fn wrap(inner: T, limiter: Arc<CompositeLimiter>) -> Self {
        debug!(
            constraints = limiter.constraints().len(),
            "Wrapping implementation with limiter"
        );
        Self { inner, limiter }
    }

    /// Admit through the limiter, then invoke `op` on the wrapped value.
    pub async fn call<'a, F, Fut>(&'a self, op: F) -> Fut::Output
    where
        F: FnOnce(&'a T) -> Fut,
        Fut: Future,
    {
        self.limiter.enqueue(|| op(&self.inner)).await
    }

    /// Like [`call`](Self::call), but the admission wait is bounded by
    /// `cancel`.
    ///
    /// `cancel` bounds only the wait for admission; it is handed to the
    /// limiter, not to `op`, so a cancellation future arriving as a call
    /// argument is not itself throttled.
    pub async fn call_until<'a, F, Fut, C>(&'a self, op: F, cancel: C) -> Result<Fut::Output>
    where
        F: FnOnce(&'a T) -> Fut,
        Fut: Future,
        C: Future<Output = ()>,
    {
        self.limiter.enqueue_until(|| op(&self.inner), cancel).await
    }

    /// Get the wrapped value, bypassing the limiter.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Get the limiter this binding admits through.
    pub fn limiter(&self) -> &CompositeLimiter {
        &self.limiter
    }
}
