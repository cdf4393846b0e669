use resilient_call::backoff::{
    MAX_JITTER_FRACTION, exponential_backoff, jittered_backoff, jittered_backoff_with,
};
use std::time::Duration;

#[test]
fn test_exponential_backoff_doubles() {
    assert_eq!(exponential_backoff(0, 100, 10000), Duration::from_millis(100));
    assert_eq!(exponential_backoff(1, 100, 10000), Duration::from_millis(200));
    assert_eq!(exponential_backoff(2, 100, 10000), Duration::from_millis(400));
    assert_eq!(exponential_backoff(3, 100, 10000), Duration::from_millis(800));
}

#[test]
fn test_exponential_backoff_max_delay() {
    let delay = exponential_backoff(20, 100, 1000);
    // 2^20 * 100 = 104857600ms, capped at 1000ms
    assert_eq!(delay, Duration::from_millis(1000));
}

#[test]
fn test_exponential_backoff_huge_attempt_saturates() {
    let delay = exponential_backoff(u32::MAX, u64::MAX / 2, 5000);
    assert_eq!(delay, Duration::from_millis(5000));
}

#[test]
fn test_jitter_bounds_explicit() {
    // No jitter
    assert_eq!(
        jittered_backoff_with(2, 100, 10000, 0.0),
        Duration::from_millis(400)
    );
    // Full 10% jitter
    assert_eq!(
        jittered_backoff_with(2, 100, 10000, 0.1),
        Duration::from_millis(440)
    );
    // Out-of-range fractions are clamped
    assert_eq!(
        jittered_backoff_with(2, 100, 10000, 5.0),
        Duration::from_millis(440)
    );
    assert_eq!(
        jittered_backoff_with(2, 100, 10000, -1.0),
        Duration::from_millis(400)
    );
}

#[test]
fn test_jitter_respects_max_delay() {
    assert_eq!(
        jittered_backoff_with(3, 100, 850, MAX_JITTER_FRACTION),
        Duration::from_millis(850)
    );
}

#[test]
fn test_jittered_backoff_never_exceeds_max() {
    for attempt in 0..40 {
        for _ in 0..20 {
            let delay = jittered_backoff(attempt, 1000, 10000);
            assert!(delay <= Duration::from_millis(10000), "attempt {}", attempt);
        }
    }
}

#[test]
fn test_jittered_backoff_within_jitter_window() {
    for attempt in 0..4 {
        let exponential = 100u64 * 2u64.pow(attempt);
        let upper = exponential + exponential / 10;
        for _ in 0..50 {
            let delay = jittered_backoff(attempt, 100, 100_000).as_millis() as u64;
            assert!(
                (exponential..=upper).contains(&delay),
                "attempt {} delay {} outside [{}, {}]",
                attempt,
                delay,
                exponential,
                upper
            );
        }
    }
}
