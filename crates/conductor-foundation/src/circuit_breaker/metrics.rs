//! Circuit Breaker Metrics
//!
//! Read-only snapshots of a breaker's counters and its recent state
//! transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::State;

/// Number of transitions retained per breaker
pub(crate) const TRANSITION_HISTORY_LIMIT: usize = 100;

/// State transition event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Previous state
    pub from_state: State,
    /// New state
    pub to_state: State,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
}

impl StateTransition {
    /// Create a new state transition stamped with the current time
    pub fn new(from_state: State, to_state: State) -> Self {
        Self {
            from_state,
            to_state,
            timestamp: Utc::now(),
        }
    }
}

/// Serializable metrics for monitoring/display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerMetricsSnapshot {
    /// Breaker name
    pub name: String,
    /// Current state
    pub state: State,
    /// Calls that reached the guarded operation since the breaker last closed
    pub total_calls: u64,
    /// Successful calls since the breaker last closed
    pub success_count: u64,
    /// Counted failures since the breaker last closed
    pub failure_count: u64,
    /// `failure_count / total_calls`, 0.0 when no calls were made
    pub failure_rate: f64,
    /// Calls rejected while open
    pub rejected_count: u64,
    /// Consecutive successes in the current half-open window
    pub half_open_successes: u64,
    /// Number of state transitions over the breaker's lifetime
    pub transitions: u64,
}

impl CircuitBreakerMetricsSnapshot {
    /// Success rate in the range 0.0..=1.0
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_calls as f64
        }
    }
}

pub(crate) fn failure_rate(failures: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        failures as f64 / total as f64
    }
}

impl std::fmt::Display for CircuitBreakerMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Circuit Breaker '{}' ({}):", self.name, self.state)?;
        writeln!(f, "  Total Calls: {}", self.total_calls)?;
        writeln!(f, "  Successes: {}", self.success_count)?;
        writeln!(f, "  Failures: {}", self.failure_count)?;
        writeln!(f, "  Rejected: {}", self.rejected_count)?;
        writeln!(f, "  Failure Rate: {:.2}%", self.failure_rate * 100.0)?;
        writeln!(f, "  Half-Open Successes: {}", self.half_open_successes)?;
        writeln!(f, "  Total State Transitions: {}", self.transitions)?;
        Ok(())
    }
}
