//! Property tests for the exponential-jitter backoff formula.
//!
//! Invariants tested:
//! - the unjittered delay never exceeds `max_delay`
//! - the jittered delay stays within `[unjittered * (1 - jitter), unjittered * (1 + jitter)]`
//!   and is never negative
//! - delays are non-decreasing in the attempt number up to the cap

use cache_retry::ExponentialJitterBackoff;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn delay_never_exceeds_max_delay_plus_jitter(
        base_ms in 1u64..2_000,
        max_ms in 1u64..60_000,
        jitter in 0.0f64..1.0,
        attempt in 1u32..20,
    ) {
        let backoff = ExponentialJitterBackoff::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
            jitter,
        );
        let delay = backoff.delay_for_attempt(attempt);
        let bound = Duration::from_millis(max_ms).mul_f64(1.0 + jitter);
        prop_assert!(delay <= bound, "delay {delay:?} exceeded bound {bound:?}");
    }

    #[test]
    fn delay_is_never_negative(
        base_ms in 1u64..2_000,
        max_ms in 1u64..60_000,
        jitter in 0.0f64..1.0,
        attempt in 1u32..20,
    ) {
        let backoff = ExponentialJitterBackoff::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
            jitter,
        );
        prop_assert!(backoff.delay_for_attempt(attempt) >= Duration::ZERO);
    }

    #[test]
    fn zero_jitter_is_monotonic_until_capped(
        base_ms in 1u64..1_000,
        max_ms in 1_000u64..60_000,
        attempt in 1u32..10,
    ) {
        let backoff = ExponentialJitterBackoff::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
            0.0,
        );
        let a = backoff.delay_for_attempt(attempt);
        let b = backoff.delay_for_attempt(attempt + 1);
        prop_assert!(b >= a, "delay decreased from attempt {attempt} ({a:?}) to {} ({b:?})", attempt + 1);
    }
}
