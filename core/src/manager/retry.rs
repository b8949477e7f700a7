use std::time::Duration;

use crate::client::GenerateErrorKind;
use crate::queue::{BackoffKind, GenerationSettings};

/// Decides whether and when a failed generation is tried again.
///
/// `attempt` is the task's retry count before this failure (0 on the first).
pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
    fn max_attempts(&self) -> u32;
    fn should_retry(&self, attempt: u32, kind: Option<GenerateErrorKind>) -> bool {
        attempt < self.max_attempts() && kind.is_some_and(GenerateErrorKind::is_retryable)
    }
}

pub struct FixedDelay {
    delay_ms: u64,
    max_retries: u32,
}

impl FixedDelay {
    pub fn new(delay_ms: u64, max_retries: u32) -> Self {
        Self {
            delay_ms,
            max_retries,
        }
    }
}

impl RetryStrategy for FixedDelay {
    fn name(&self) -> &str {
        "fixed"
    }

    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        Some(Duration::from_millis(self.delay_ms))
    }

    fn max_attempts(&self) -> u32 {
        self.max_retries
    }
}

pub struct ExponentialBackoff {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_retries: u32,
}

impl ExponentialBackoff {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            max_retries,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential"
    }

    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let exp = 1u64 << attempt.min(30);
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        Some(Duration::from_millis(delay))
    }

    fn max_attempts(&self) -> u32 {
        self.max_retries
    }
}

pub fn strategy_for(settings: &GenerationSettings) -> Box<dyn RetryStrategy> {
    match settings.backoff {
        BackoffKind::Fixed => Box::new(FixedDelay::new(settings.retry_delay_ms, settings.max_retries)),
        BackoffKind::Exponential => Box::new(ExponentialBackoff::new(
            settings.retry_delay_ms,
            settings.max_retry_delay_ms,
            settings.max_retries,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let strategy = FixedDelay::new(1000, 2);
        assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(1000)));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(1000)));
        assert_eq!(strategy.next_delay(2), None);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let strategy = ExponentialBackoff::new(100, 350, 5);
        assert_eq!(strategy.next_delay(0).unwrap().as_millis(), 100);
        assert_eq!(strategy.next_delay(1).unwrap().as_millis(), 200);
        assert_eq!(strategy.next_delay(2).unwrap().as_millis(), 350);
        assert_eq!(strategy.next_delay(5), None);
    }

    #[test]
    fn test_should_retry_respects_kind_and_budget() {
        let strategy = FixedDelay::new(10, 2);
        assert!(strategy.should_retry(0, Some(GenerateErrorKind::Transient)));
        assert!(strategy.should_retry(1, Some(GenerateErrorKind::Provider)));
        assert!(!strategy.should_retry(2, Some(GenerateErrorKind::Transient)));
        assert!(!strategy.should_retry(0, Some(GenerateErrorKind::Config)));
        assert!(!strategy.should_retry(0, Some(GenerateErrorKind::InvalidRequest)));
        assert!(!strategy.should_retry(0, None));
    }

    #[test]
    fn test_strategy_for_settings() {
        let mut settings = GenerationSettings::default();
        assert_eq!(strategy_for(&settings).name(), "fixed");
        settings.backoff = BackoffKind::Exponential;
        assert_eq!(strategy_for(&settings).name(), "exponential");
    }
}
