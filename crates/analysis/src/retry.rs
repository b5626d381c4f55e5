//! Shared backoff schedule for transient AI-service failures.

use std::time::Duration;

const BASE_DELAY_MS: u64 = 500;
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Exponential backoff for the given 1-based attempt number, capped.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(6);
    Duration::from_millis(BASE_DELAY_MS * 2u64.pow(exp)).min(MAX_DELAY)
}
