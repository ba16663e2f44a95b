use std::time::Duration;

/// Abstraction for computing the delay before a retry attempt.
pub trait IntervalFunction: Send + Sync {
    /// Computes the delay before attempt `attempt` (0-indexed: the first
    /// retry, i.e. the second overall attempt, is `attempt == 0`).
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Fixed interval backoff - returns the same duration for every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Exponential backoff with full jitter:
/// `delay(k) = min(maxDelay, baseDelay * 2^(k-1)) * (1 + U(-jitterFactor, +jitterFactor))`,
/// clamped to be non-negative, where `k >= 1` is the retry attempt number.
///
/// `next_interval` is 0-indexed (`attempt` 0 is the first retry, `k = attempt + 1`).
#[derive(Debug, Clone)]
pub struct ExponentialJitterBackoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl ExponentialJitterBackoff {
    /// Creates a new backoff. `jitter_factor` is clamped to `[0.0, 1.0]`.
    pub fn new(base_delay: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    fn unjittered(&self, k: u32) -> Duration {
        let multiplier = 2f64.powi(k as i32 - 1);
        let scaled = self.base_delay.mul_f64(multiplier);
        scaled.min(self.max_delay)
    }

    fn jitter(&self, duration: Duration) -> Duration {
        if self.jitter_factor == 0.0 {
            return duration;
        }
        use rand::Rng;
        let mut rng = rand::rng();
        let factor = rng.random_range(-self.jitter_factor..=self.jitter_factor);
        let seconds = duration.as_secs_f64() * (1.0 + factor);
        Duration::from_secs_f64(seconds.max(0.0))
    }

    /// Computes the delay for retry attempt `k >= 1`.
    pub fn delay_for_attempt(&self, k: u32) -> Duration {
        self.jitter(self.unjittered(k))
    }
}

impl IntervalFunction for ExponentialJitterBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        self.delay_for_attempt(attempt as u32 + 1)
    }
}

/// Function-based interval implementation, for callers who need a backoff
/// shape not covered by [`FixedInterval`]/[`ExponentialJitterBackoff`].
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_interval_returns_same_duration() {
        let backoff = FixedInterval::new(Duration::from_secs(1));
        assert_eq!(backoff.next_interval(0), Duration::from_secs(1));
        assert_eq!(backoff.next_interval(10), Duration::from_secs(1));
    }

    #[test]
    fn exponential_without_jitter_doubles_each_attempt() {
        let backoff =
            ExponentialJitterBackoff::new(Duration::from_millis(100), Duration::from_secs(10), 0.0);
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn exponential_respects_max_delay() {
        let backoff = ExponentialJitterBackoff::new(
            Duration::from_millis(100),
            Duration::from_millis(500),
            0.0,
        );
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_millis(500));
        assert_eq!(backoff.delay_for_attempt(10), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_bounds_and_non_negative() {
        let backoff = ExponentialJitterBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(10),
            0.5,
        );
        for _ in 0..50 {
            let delay = backoff.delay_for_attempt(2);
            assert!(delay >= Duration::ZERO);
            assert!(delay <= Duration::from_millis(300));
            assert!(delay >= Duration::from_millis(100));
        }
    }

    #[test]
    fn next_interval_maps_zero_indexed_attempt_to_k_one() {
        let backoff =
            ExponentialJitterBackoff::new(Duration::from_millis(100), Duration::from_secs(10), 0.0);
        assert_eq!(backoff.next_interval(0), backoff.delay_for_attempt(1));
        assert_eq!(backoff.next_interval(2), backoff.delay_for_attempt(3));
    }

    #[test]
    fn fn_interval_uses_custom_function() {
        let backoff = FnInterval::new(|attempt| Duration::from_secs((attempt + 1) as u64));
        assert_eq!(backoff.next_interval(0), Duration::from_secs(1));
        assert_eq!(backoff.next_interval(2), Duration::from_secs(3));
    }
}
