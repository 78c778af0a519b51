//! Circuit Breaker State Machine
//!
//! Implements the core circuit breaker state machine with three states:
//! - Closed: Normal operation, requests are allowed
//! - Open: Circuit is open, requests are rejected without running the operation
//! - Half-Open: Probing whether the dependency has recovered
//!
//! All counters and the state live behind one mutex so that concurrent
//! outcomes against the same breaker are applied one at a time.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::{BreakerHooks, CircuitBreakerConfig};
use super::metrics::{
    failure_rate, CircuitBreakerMetricsSnapshot, StateTransition, TRANSITION_HISTORY_LIMIT,
};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Normal operation - requests are allowed
    Closed,
    /// Circuit is open - requests are rejected
    Open,
    /// Testing recovery - calls are trial probes
    HalfOpen,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Open => write!(f, "open"),
            State::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Error returned by a guarded call
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// The breaker rejected the call without running the operation
    CircuitOpen { name: String },
    /// The operation itself failed
    Operation(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen { .. })
    }

    /// The operation's error, if the operation ran
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CircuitBreakerError::Operation(e) => Some(e),
            CircuitBreakerError::CircuitOpen { .. } => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitBreakerError::CircuitOpen { name } => {
                write!(f, "Circuit breaker '{}' is open", name)
            }
            CircuitBreakerError::Operation(e) => write!(f, "{}", e),
        }
    }
}

impl<E> std::error::Error for CircuitBreakerError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CircuitBreakerError::CircuitOpen { .. } => None,
            CircuitBreakerError::Operation(e) => Some(e),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: State,
    total_calls: u64,
    success_count: u64,
    failure_count: u64,
    half_open_successes: u64,
    rejected_count: u64,
    transitions: u64,
    opened_at: Option<Instant>,
    history: VecDeque<StateTransition>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: State::Closed,
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            half_open_successes: 0,
            rejected_count: 0,
            transitions: 0,
            opened_at: None,
            history: VecDeque::new(),
        }
    }

    fn clear_counters(&mut self) {
        self.total_calls = 0;
        self.success_count = 0;
        self.failure_count = 0;
        self.half_open_successes = 0;
        self.rejected_count = 0;
    }
}

/// Circuit Breaker implementation
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    hooks: BreakerHooks,
    inner: Mutex<BreakerInner>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Arc<Self> {
        Self::with_hooks(name, config, BreakerHooks::default())
    }

    /// Create with default configuration
    pub fn with_default(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Create a breaker with an error filter and/or state change hook
    pub fn with_hooks(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        hooks: BreakerHooks,
    ) -> Arc<Self> {
        let breaker = Arc::new(Self {
            name: name.into(),
            config,
            hooks,
            inner: Mutex::new(BreakerInner::new()),
            monitor: Mutex::new(None),
        });

        if breaker.config.enable_metrics {
            breaker.spawn_monitor();
        }

        breaker
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state
    ///
    /// An open breaker whose reset timeout has elapsed reports (and moves to)
    /// half-open.
    pub fn state(&self) -> State {
        let (state, changed) = {
            let mut inner = self.inner.lock();
            let changed = self.refresh(&mut inner);
            (inner.state, changed)
        };
        self.notify(changed);
        state
    }

    /// Execute an operation through the circuit breaker
    ///
    /// While open the operation is not invoked.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let Some(epoch) = self.admit() else {
            return Err(self.open_error());
        };

        match operation().await {
            Ok(value) => {
                self.on_success(epoch);
                Ok(value)
            }
            Err(error) => {
                self.on_failure(&error, epoch);
                Err(CircuitBreakerError::Operation(error))
            }
        }
    }

    /// Execute an operation with bounded retries
    ///
    /// Makes at most `max_retries` attempts (at least one), each routed
    /// through [`call`](Self::call), sleeping `retry_delay` between them.
    /// Returns immediately if the breaker is or becomes open.
    pub async fn call_with_retry<F, Fut, T, E>(
        &self,
        mut operation: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.call(&mut operation).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(breaker = %self.name, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err @ CircuitBreakerError::CircuitOpen { .. }) => {
                    debug!(breaker = %self.name, attempt, "Retry stopped: circuit is open");
                    return Err(err);
                }
                Err(err) if attempt >= max_attempts => {
                    warn!(
                        breaker = %self.name,
                        attempts = attempt,
                        error = %err,
                        "Operation failed after exhausting retries"
                    );
                    return Err(err);
                }
                Err(err) => {
                    debug!(
                        breaker = %self.name,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                }
            }
        }
    }

    /// Force the circuit into a specific state
    pub fn force_state(&self, state: State) {
        let changed = {
            let mut inner = self.inner.lock();
            self.transition(&mut inner, state)
        };
        self.notify(changed);
    }

    /// Clear all counters and force the breaker closed
    pub fn reset(&self) {
        let changed = {
            let mut inner = self.inner.lock();
            let changed = self.transition(&mut inner, State::Closed);
            inner.clear_counters();
            changed
        };
        self.notify(changed);
    }

    /// Take a snapshot of the current metrics
    pub fn metrics(&self) -> CircuitBreakerMetricsSnapshot {
        let changed;
        let snapshot = {
            let mut inner = self.inner.lock();
            changed = self.refresh(&mut inner);
            self.snapshot(&inner)
        };
        self.notify(changed);
        snapshot
    }

    /// Recent state transitions, oldest first
    pub fn transitions(&self) -> Vec<StateTransition> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Stop the background metrics monitor
    pub fn destroy(&self) {
        if let Some(handle) = self.monitor.lock().take() {
            handle.abort();
            debug!(breaker = %self.name, "Metrics monitor stopped");
        }
    }

    /// Whether a metrics monitor task is currently running
    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Admit a call; returns the transition count it was admitted under
    fn admit(&self) -> Option<u64> {
        let (epoch, changed) = {
            let mut inner = self.inner.lock();
            let changed = self.refresh(&mut inner);
            let epoch = if inner.state == State::Open {
                inner.rejected_count += 1;
                None
            } else {
                Some(inner.transitions)
            };
            (epoch, changed)
        };
        self.notify(changed);

        if epoch.is_none() {
            debug!(breaker = %self.name, "Call rejected: circuit is open");
        }
        epoch
    }

    // Outcomes of calls admitted before the last transition update the
    // counters but never move the state.
    fn on_success(&self, epoch: u64) {
        let changed = {
            let mut inner = self.inner.lock();
            inner.total_calls += 1;
            inner.success_count += 1;

            if inner.state == State::HalfOpen && inner.transitions == epoch {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= u64::from(self.config.success_threshold.max(1)) {
                    let changed = self.transition(&mut inner, State::Closed);
                    inner.clear_counters();
                    changed
                } else {
                    None
                }
            } else {
                None
            }
        };
        self.notify(changed);
    }

    fn on_failure(&self, error: &(dyn std::error::Error + 'static), epoch: u64) {
        let counted = self
            .hooks
            .error_filter
            .as_ref()
            .is_none_or(|filter| filter(error));

        let changed = {
            let mut inner = self.inner.lock();
            inner.total_calls += 1;
            if !counted {
                None
            } else {
                inner.failure_count += 1;
                if inner.transitions != epoch {
                    None
                } else {
                    match inner.state {
                        State::HalfOpen => self.transition(&mut inner, State::Open),
                        State::Closed
                            if inner.failure_count
                                >= u64::from(self.config.failure_threshold.max(1)) =>
                        {
                            self.transition(&mut inner, State::Open)
                        }
                        _ => None,
                    }
                }
            }
        };
        if !counted {
            debug!(breaker = %self.name, error = %error, "Error ignored by filter");
        }
        self.notify(changed);
    }

    /// Move an expired open breaker to half-open
    fn refresh(&self, inner: &mut BreakerInner) -> Option<State> {
        if inner.state != State::Open {
            return None;
        }
        match inner.opened_at {
            Some(opened_at) if opened_at.elapsed() >= self.config.reset_timeout() => {
                self.transition(inner, State::HalfOpen)
            }
            _ => None,
        }
    }

    /// Apply a transition; returns the new state if it changed
    fn transition(&self, inner: &mut BreakerInner, to: State) -> Option<State> {
        let from = inner.state;
        if from == to {
            return None;
        }

        inner.state = to;
        inner.transitions += 1;
        if inner.history.len() >= TRANSITION_HISTORY_LIMIT {
            inner.history.pop_front();
        }
        inner.history.push_back(StateTransition::new(from, to));

        match to {
            State::Open => {
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
                warn!(
                    breaker = %self.name,
                    from = %from,
                    failures = inner.failure_count,
                    "Circuit breaker opened"
                );
            }
            State::HalfOpen => {
                inner.half_open_successes = 0;
                info!(breaker = %self.name, "Circuit breaker half-open, probing recovery");
            }
            State::Closed => {
                inner.opened_at = None;
                info!(breaker = %self.name, from = %from, "Circuit breaker closed");
            }
        }

        Some(to)
    }

    /// Run the state change hook outside the lock
    fn notify(&self, changed: Option<State>) {
        let (Some(state), Some(hook)) = (changed, &self.hooks.on_state_change) else {
            return;
        };
        let snapshot = self.snapshot(&self.inner.lock());
        hook(state, &snapshot);
    }

    fn snapshot(&self, inner: &BreakerInner) -> CircuitBreakerMetricsSnapshot {
        CircuitBreakerMetricsSnapshot {
            name: self.name.clone(),
            state: inner.state,
            total_calls: inner.total_calls,
            success_count: inner.success_count,
            failure_count: inner.failure_count,
            failure_rate: failure_rate(inner.failure_count, inner.total_calls),
            rejected_count: inner.rejected_count,
            half_open_successes: inner.half_open_successes,
            transitions: inner.transitions,
        }
    }

    fn open_error<E>(&self) -> CircuitBreakerError<E> {
        CircuitBreakerError::CircuitOpen {
            name: self.name.clone(),
        }
    }

    fn spawn_monitor(self: &Arc<Self>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(breaker = %self.name, "No tokio runtime, metrics monitor disabled");
            return;
        };

        let breaker: Weak<Self> = Arc::downgrade(self);
        let period = self.config.monitoring_period();
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(breaker) = breaker.upgrade() else {
                    break;
                };
                let m = breaker.metrics();
                debug!(
                    breaker = %m.name,
                    state = %m.state,
                    total_calls = m.total_calls,
                    failure_count = m.failure_count,
                    failure_rate = m.failure_rate,
                    rejected = m.rejected_count,
                    "Circuit breaker metrics"
                );
            }
        });

        *self.monitor.lock() = Some(handle);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.inner.lock().state)
            .finish()
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor.get_mut().take() {
            handle.abort();
        }
    }
}
