use std::time::Duration;

use crate::config::RetrySettings;

/// When and how often the relay reconnects after losing the broker.
///
/// The default is a fixed five second delay, forever, and no retry when the
/// very first connect fails.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Multiplier applied per attempt; values at or below 1.0 keep the delay fixed.
    pub backoff_factor: f64,
    /// Upper bound for a grown delay.
    pub max_delay: Duration,
    /// Whether a failed initial `connect()` enters the reconnect loop too.
    pub retry_initial_failure: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            max_attempts: None,
            backoff_factor: 1.0,
            max_delay: Duration::from_secs(60),
            retry_initial_failure: false,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            delay: Duration::from_millis(settings.delay_ms),
            max_attempts: settings.max_attempts,
            backoff_factor: settings.backoff_factor,
            max_delay: Duration::from_millis(settings.max_delay_ms),
            retry_initial_failure: settings.retry_initial_failure,
        }
    }
}

impl RetryPolicy {
    /// A fixed delay with no attempt cap.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt number `attempt` (starting at 1),
    /// or `None` once the attempt cap is exceeded.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        if self.backoff_factor <= 1.0 || attempt <= 1 {
            return Some(self.delay);
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let grown = self.delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let ceiling = self.max_delay.max(self.delay).as_secs_f64();
        Some(Duration::from_secs_f64(grown.min(ceiling)))
    }
}
