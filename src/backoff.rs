//! Exponential backoff delay calculation
//!
//! Provides the deterministic exponential delay and the jittered variant
//! used between retry attempts.

use rand::Rng;
use std::time::Duration;

/// Upper bound on the random jitter, as a fraction of the exponential delay.
pub const MAX_JITTER_FRACTION: f64 = 0.1;

/// Calculate exponential backoff delay for a given attempt number.
///
/// # Arguments
///
/// * `attempt` - Current attempt number (0-indexed)
/// * `base_delay_ms` - Base delay in milliseconds for the first retry
/// * `max_delay_ms` - Maximum delay cap in milliseconds
///
/// # Example
///
/// ```
/// use resilient_call::backoff::exponential_backoff;
/// use std::time::Duration;
///
/// assert_eq!(exponential_backoff(0, 100, 5000), Duration::from_millis(100));
/// assert_eq!(exponential_backoff(3, 100, 5000), Duration::from_millis(800));
/// ```
pub fn exponential_backoff(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    Duration::from_millis(exponential_ms(attempt, base_delay_ms).min(max_delay_ms))
}

/// Exponential backoff with up to 10% additive jitter, capped at `max_delay_ms`.
///
/// `base * 2^attempt + uniform(0, 0.1) * base * 2^attempt`, then clamped.
pub fn jittered_backoff(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let fraction = rand::thread_rng().gen_range(0.0..=MAX_JITTER_FRACTION);
    jittered_backoff_with(attempt, base_delay_ms, max_delay_ms, fraction)
}

/// Same as [`jittered_backoff`] with an explicit jitter fraction.
///
/// `jitter_fraction` is clamped into `[0, MAX_JITTER_FRACTION]`.
pub fn jittered_backoff_with(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_fraction: f64,
) -> Duration {
    let exponential = exponential_ms(attempt, base_delay_ms);
    let fraction = jitter_fraction.clamp(0.0, MAX_JITTER_FRACTION);
    let jitter = (exponential as f64 * fraction) as u64;
    Duration::from_millis(exponential.saturating_add(jitter).min(max_delay_ms))
}

fn exponential_ms(attempt: u32, base_delay_ms: u64) -> u64 {
    // 2^attempt capped at 2^32 so the multiplication saturates instead of overflowing
    base_delay_ms.saturating_mul(2u64.saturating_pow(attempt.min(32)))
}
