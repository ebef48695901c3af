//! Session tuning: timeouts, retry limits and backoff.
//!
//! Plain data with defaults; nothing here reads the environment.

use std::time::Duration;

use rand::Rng;

const DEFAULT_APPEND_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(200);
const DEFAULT_RETRY_CAP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Deadline of a single `append` attempt.
    pub append_timeout: Duration,
    /// Attempts per commit before it is reported failed.
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub retry_base: Duration,
    /// Upper bound of any retry delay.
    pub retry_cap: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            append_timeout: DEFAULT_APPEND_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base: DEFAULT_RETRY_BASE,
            retry_cap: DEFAULT_RETRY_CAP,
        }
    }
}

impl SyncConfig {
    /// Delay before retry number `attempt` (1-based): exponential, capped,
    /// with jitter over the upper half.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .retry_base
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.retry_cap);
        let ceiling = u64::try_from(exp.as_millis()).unwrap_or(u64::MAX);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(ceiling / 2..=ceiling))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SyncConfig::default();
        assert_eq!(c.append_timeout, Duration::from_secs(5));
        assert_eq!(c.max_attempts, 4);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let c = SyncConfig::default();
        for _ in 0..50 {
            let first = c.backoff(1);
            assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(200));
            let third = c.backoff(3);
            assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(800));
            assert!(c.backoff(30) <= c.retry_cap);
        }
    }

    #[test]
    fn zero_base_means_no_delay() {
        let c = SyncConfig { retry_base: Duration::ZERO, ..SyncConfig::default() };
        assert_eq!(c.backoff(3), Duration::ZERO);
    }
}
