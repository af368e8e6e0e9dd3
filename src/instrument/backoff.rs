//! Reconnect policy for the agent's connection loop.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

/// Doubling past this many steps always lands on the cap.
const MAX_STEP: usize = 32;

/// Exponential backoff with a cap and log suppression after repeated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures after which reconnect attempts stop being logged at `warn`.
    pub quiet_after: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            quiet_after: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt after `failures` consecutive failures (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        let step = (failures.saturating_sub(1) as usize).min(MAX_STEP);
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(step.saturating_add(1))
            .build()
            .nth(step)
            .unwrap_or(self.max_delay)
    }

    /// Whether the `failures`-th consecutive failure should still be reported.
    pub fn should_log(&self, failures: u32) -> bool {
        failures <= self.quiet_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_millis(1000));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(3), Duration::from_millis(4000));
        assert_eq!(policy.delay(5), Duration::from_millis(16_000));
        assert_eq!(policy.delay(6), Duration::from_millis(30_000));
        assert_eq!(policy.delay(40), Duration::from_millis(30_000));
    }

    #[test]
    fn test_delay_respects_custom_bounds() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(100),
            quiet_after: 2,
        };
        assert_eq!(policy.delay(0), Duration::from_millis(20));
        assert_eq!(policy.delay(3), Duration::from_millis(80));
        assert_eq!(policy.delay(4), Duration::from_millis(100));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(100));
    }

    #[test]
    fn test_logging_goes_quiet_after_threshold() {
        let policy = ReconnectPolicy::default();
        assert!(policy.should_log(1));
        assert!(policy.should_log(5));
        assert!(!policy.should_log(6));
        assert!(!policy.should_log(100));
    }
}
