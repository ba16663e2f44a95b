use crate::backoff::{ExponentialJitterBackoff, IntervalFunction};
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a failed call should be retried.
///
/// The default predicate treats every error as retryable. Callers with a
/// richer error taxonomy (e.g. one that distinguishes network errors from
/// permanent 4xx responses) should supply their own via
/// [`crate::config::RetryConfigBuilder::retry_on`].
pub trait RetryPredicate<E>: Send + Sync {
    fn should_retry(&self, err: &E) -> bool;
}

impl<E, F> RetryPredicate<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, err: &E) -> bool {
        self(err)
    }
}

/// A predicate that retries unconditionally.
pub struct AlwaysRetry;

impl<E> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _err: &E) -> bool {
        true
    }
}

pub(crate) type SharedPredicate<E> = Arc<dyn RetryPredicate<E>>;

/// A retry policy: how many times to retry, how long to wait between
/// attempts, and which errors are worth retrying at all.
///
/// Mirrors the `(maxRetries, baseDelay, maxDelay, jitterFactor, isRetryable)`
/// shape of a retry policy - `max_retries` bounds the number of *additional*
/// attempts after the first, `interval` computes the delay before each one,
/// and `predicate` decides whether a given failure is worth retrying.
pub struct RetryPolicy<E> {
    pub(crate) max_retries: u32,
    pub(crate) interval: Arc<dyn IntervalFunction>,
    pub(crate) predicate: SharedPredicate<E>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            interval: Arc::clone(&self.interval),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Builds a policy using the spec's default exponential-with-jitter
    /// backoff and a predicate that retries every error.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration, jitter_factor: f64) -> Self
    where
        E: 'static,
    {
        Self {
            max_retries,
            interval: Arc::new(ExponentialJitterBackoff::new(base_delay, max_delay, jitter_factor)),
            predicate: Arc::new(AlwaysRetry),
        }
    }

    pub(crate) fn should_retry(&self, err: &E) -> bool {
        self.predicate.should_retry(err)
    }

    pub(crate) fn delay_for(&self, attempt: usize) -> Duration {
        self.interval.next_interval(attempt)
    }
}
