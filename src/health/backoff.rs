use crate::config::duration_str;
use crate::error::{HealthgateError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for the health gate
///
/// Delays grow linearly by `delay_increment` from `initial_delay` and are
/// capped at `max_delay`. The policy is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of health probes
    pub max_attempts: u32,
    /// Delay after the first failed probe
    #[serde(with = "duration_str")]
    pub initial_delay: Duration,
    /// Amount added to the delay after every failed probe
    #[serde(with = "duration_str")]
    pub delay_increment: Duration,
    /// Ceiling for the delay
    #[serde(with = "duration_str")]
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        delay_increment: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            delay_increment,
            max_delay,
        }
    }

    /// Delay that follows `current` in the series
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_add(self.delay_increment).min(self.max_delay)
    }

    /// The delay series, one entry per failed probe
    pub fn delays(&self) -> Delays<'_> {
        Delays {
            policy: self,
            next: self.initial_delay.min(self.max_delay),
            remaining: self.max_attempts,
        }
    }

    /// Total time slept when every probe fails
    pub fn worst_case_sleep(&self) -> Duration {
        self.delays().sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(HealthgateError::ConfigValidationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.initial_delay > self.max_delay {
            return Err(HealthgateError::ConfigValidationError(format!(
                "retry.initial_delay ({:?}) exceeds retry.max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }

        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            15,
            Duration::from_secs(2),
            Duration::from_secs(1),
            Duration::from_secs(10),
        )
    }
}

/// Iterator over the capped delay series of a [`RetryPolicy`]
pub struct Delays<'a> {
    policy: &'a RetryPolicy,
    next: Duration,
    remaining: u32,
}

impl Iterator for Delays<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next;
        self.next = self.policy.next_delay(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_series_is_capped() {
        let policy = RetryPolicy::default();
        let secs: Vec<u64> = policy.delays().take(14).map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![2, 3, 4, 5, 6, 7, 8, 9, 10, 10, 10, 10, 10, 10]);
        assert_eq!(policy.delays().count(), 15);
    }

    #[test]
    fn test_worst_case_sleep_bounded_by_ceiling() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.worst_case_sleep(), Duration::from_secs(114));
        assert!(policy.worst_case_sleep() <= policy.max_delay * policy.max_attempts);
    }

    #[test]
    fn test_constant_delay() {
        let policy = RetryPolicy::new(
            4,
            Duration::from_secs(3),
            Duration::ZERO,
            Duration::from_secs(3),
        );
        assert_eq!(policy.worst_case_sleep(), Duration::from_secs(12));
    }

    #[test]
    fn test_next_delay_never_decreases() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        for _ in 0..20 {
            let next = policy.next_delay(delay);
            assert!(next >= delay);
            assert!(next <= policy.max_delay);
            delay = next;
        }
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());

        let mut zero = RetryPolicy::default();
        zero.max_attempts = 0;
        assert!(zero.validate().is_err());

        let mut inverted = RetryPolicy::default();
        inverted.initial_delay = Duration::from_secs(20);
        assert!(inverted.validate().is_err());
    }
}
