//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate the delay before retry number `attempt` (1-based).
///
/// `base * 2^(attempt - 1)`, capped at `max`. With `jitter`, up to 10% of
/// the capped delay is added on top.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, jitter: bool) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(attempt - 1);
    let capped_delay = base.saturating_mul(exponential_base).min(max);

    if !jitter {
        return capped_delay;
    }

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = (capped_delay.as_nanos() / 10) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped_delay + Duration::from_nanos(jitter)
}
