//! Circuit Breaker Configuration
//!
//! Numeric settings are plain serde data so they can come from a config file.
//! Callbacks (error filter, state change hook) are attached separately through
//! [`BreakerHooks`].

use super::metrics::CircuitBreakerMetricsSnapshot;
use super::state::State;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of failures (since the breaker last closed) before opening
    pub failure_threshold: u32,
    /// Number of consecutive half-open successes needed to close again
    pub success_threshold: u32,
    /// Time the breaker stays open before the next call probes (milliseconds)
    pub reset_timeout_ms: u64,
    /// Interval of the background metrics monitor (milliseconds)
    pub monitoring_period_ms: u64,
    /// Maximum attempts made by `call_with_retry`
    pub max_retries: u32,
    /// Fixed delay between retry attempts (milliseconds)
    pub retry_delay_ms: u64,
    /// Whether to run the background metrics monitor
    pub enable_metrics: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout_ms: 30_000,
            monitoring_period_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            enable_metrics: false,
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the reset timeout
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the monitoring period
    pub fn with_monitoring_period(mut self, period: Duration) -> Self {
        self.monitoring_period_ms = period.as_millis() as u64;
        self
    }

    /// Set the retry budget and the delay between attempts
    pub fn with_retry(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Enable or disable the background metrics monitor
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    pub fn monitoring_period(&self) -> Duration {
        Duration::from_millis(self.monitoring_period_ms.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Preset for HTTP-like dependencies
    pub fn http() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout_ms: 30_000,
            max_retries: 3,
            retry_delay_ms: 1_000,
            ..Default::default()
        }
    }

    /// Preset for database-like dependencies (opens quickly, recovers slowly)
    pub fn database() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            reset_timeout_ms: 60_000,
            max_retries: 2,
            retry_delay_ms: 500,
            ..Default::default()
        }
    }

    /// Preset for remote API dependencies (tolerates more failures)
    pub fn api() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 3,
            reset_timeout_ms: 45_000,
            max_retries: 3,
            retry_delay_ms: 2_000,
            ..Default::default()
        }
    }
}

/// Predicate deciding whether an error counts toward the failure threshold
pub type ErrorFilter = Arc<dyn Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// Callback invoked after every state transition
pub type StateChangeHook = Arc<dyn Fn(State, &CircuitBreakerMetricsSnapshot) + Send + Sync>;

/// Optional callbacks attached to a circuit breaker
#[derive(Clone, Default)]
pub struct BreakerHooks {
    /// Errors for which the filter returns `false` still reach the caller
    /// but leave the state machine untouched.
    pub error_filter: Option<ErrorFilter>,
    pub on_state_change: Option<StateChangeHook>,
}

impl BreakerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&(dyn std::error::Error + 'static)) -> bool + Send + Sync + 'static,
    {
        self.error_filter = Some(Arc::new(filter));
        self
    }

    pub fn on_state_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(State, &CircuitBreakerMetricsSnapshot) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for BreakerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerHooks")
            .field("error_filter", &self.error_filter.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .finish()
    }
}
