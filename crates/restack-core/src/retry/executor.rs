//! Retry execution engine
//!
//! Runs an async operation up to `max_attempts` times, sleeping through a
//! [`Clock`] between failures so the delay schedule can be observed in tests.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::readiness::{Clock, TokioClock};
use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver, TracingObserver};
use super::strategies::calculate_delay;

/// Retry `op` with exponential backoff starting at `initial_delay`
///
/// The delay doubles after every failure. After `max_attempts` failures the
/// last error is returned as [`RetryError::Exhausted`].
///
/// ```rust,no_run
/// use restack_core::retry::retry;
/// use std::time::Duration;
///
/// async fn example() {
///     let result = retry(
///         || async { Ok::<_, std::io::Error>("jwt") },
///         3,
///         Duration::from_secs(2),
///     )
///     .await;
///     assert!(result.is_ok());
/// }
/// ```
pub async fn retry<F, Fut, T, E>(
    op: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_with_policy(&RetryPolicy::exponential(max_attempts, initial_delay), op).await
}

/// Retry `op` according to `policy`, logging attempts through `tracing`
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryExecutorBuilder::new()
        .with_policy(policy.clone())
        .with_observer(TracingObserver::default())
        .build()
        .execute(op)
        .await
}

/// Builder for configuring a [`RetryExecutor`]
///
/// ```rust
/// use restack_core::retry::{RetryExecutorBuilder, TracingObserver};
/// use restack_core::types::RetryPolicy;
///
/// let executor = RetryExecutorBuilder::new()
///     .with_policy(RetryPolicy::default())
///     .with_observer(TracingObserver::new("list stacks"))
///     .build();
/// assert_eq!(executor.policy().max_attempts, 3);
/// ```
pub struct RetryExecutorBuilder<O = NoOpObserver> {
    policy: RetryPolicy,
    observer: O,
    clock: Arc<dyn Clock>,
}

impl Default for RetryExecutorBuilder<NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder<NoOpObserver> {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            observer: NoOpObserver,
            clock: Arc::new(TokioClock::new()),
        }
    }
}

impl<O> RetryExecutorBuilder<O> {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<O2> {
        RetryExecutorBuilder {
            policy: self.policy,
            observer,
            clock: self.clock,
        }
    }

    /// Use `clock` for delays and elapsed-time accounting
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> RetryExecutor<O> {
        RetryExecutor {
            policy: self.policy,
            observer: self.observer,
            clock: self.clock,
        }
    }
}

/// A retry executor with a policy, an observer and a clock
pub struct RetryExecutor<O> {
    policy: RetryPolicy,
    observer: O,
    clock: Arc<dyn Clock>,
}

impl<O> RetryExecutor<O> {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<O: RetryObserver> RetryExecutor<O> {
    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.policy.max_attempts;
        let start = self.clock.now();

        for attempt in 1..=max_attempts {
            self.observer.on_attempt_start(attempt, max_attempts);

            match op().await {
                Ok(value) => {
                    self.observer
                        .on_success(attempt, self.clock.now().saturating_sub(start));
                    return Ok(value);
                }
                Err(err) if attempt >= max_attempts => {
                    self.observer.on_exhausted(attempt, &err);
                    return Err(RetryError::exhausted(
                        attempt,
                        err,
                        self.clock.now().saturating_sub(start),
                    ));
                }
                Err(err) => {
                    let delay = calculate_delay(&self.policy, attempt);
                    self.observer.on_attempt_failed(attempt, &err, delay);
                    if !delay.is_zero() {
                        self.clock.sleep(delay).await;
                    }
                }
            }
        }

        Err(RetryError::NotAttempted)
    }
}
