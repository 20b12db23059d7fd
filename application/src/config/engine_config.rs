//! Engine parameters: workflow actor control.
//!
//! [`EngineConfig`] groups the static parameters of the
//! [`WorkflowEngine`](crate::use_cases::workflow::WorkflowEngine). These are
//! application-layer concerns; the infrastructure config loader maps the
//! TOML file onto them.

use crate::retry::RetryPolicy;
use conclave_domain::RoundSettings;
use conclave_domain::workflow::DEFAULT_MAX_EVENTS;
use std::time::Duration;

/// Workflow engine parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Retry policy for plan submission and spawn calls.
    pub retry: RetryPolicy,
    /// Tunables applied when a consensus round opens.
    pub round: RoundSettings,
    /// Number of coordination events retained in state (drop-oldest).
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            round: RoundSettings::default(),
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl EngineConfig {
    // ==================== Builder Methods ====================

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_round_settings(mut self, round: RoundSettings) -> Self {
        self.round = round;
        self
    }

    pub fn with_round_timeout(mut self, timeout: Duration) -> Self {
        self.round.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = max_events.max(1);
        self
    }

    /// Round deadline as a duration.
    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = EngineConfig::default();
        assert_eq!(config.max_events, 100);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert_eq!(config.round_timeout(), Duration::from_secs(30));
        assert_eq!(config.round.convergence_step, 0.1);
        assert_eq!(config.round.default_reputation, 0.8);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_retry(RetryPolicy::no_retry())
            .with_round_timeout(Duration::from_millis(250))
            .with_max_events(0);

        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.round.timeout_ms, 250);
        assert_eq!(config.max_events, 1);
    }
}
