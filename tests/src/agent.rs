use async_trait::async_trait;
use conductor_kernel::agent::{Agent, AgentError, AgentResult};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// What a [`MockAgent`] does with one call
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    /// Return `{"capability": ..., "input": ...}`
    Echo,
    /// Return this value
    Succeed(Value),
    /// Fail with `AgentError::ExecutionFailed(message)`
    Fail(String),
}

/// A mock agent simulating a real capability
///
/// Outcomes can be scripted per call; once the script runs out the default
/// outcome applies. Every input is recorded.
#[derive(Clone)]
pub struct MockAgent {
    capability: String,
    latency: Duration,
    default_outcome: Arc<RwLock<MockOutcome>>,
    script: Arc<RwLock<VecDeque<MockOutcome>>>,
    /// Track all inputs passed to this agent
    pub call_history: Arc<RwLock<Vec<Value>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockAgent {
    pub fn new(capability: &str) -> Self {
        Self::with_default(capability, MockOutcome::Echo)
    }

    /// An agent whose every call fails with `message`
    pub fn failing(capability: &str, message: &str) -> Self {
        Self::with_default(capability, MockOutcome::Fail(message.to_string()))
    }

    /// An agent whose every call returns `value`
    pub fn succeeding(capability: &str, value: Value) -> Self {
        Self::with_default(capability, MockOutcome::Succeed(value))
    }

    fn with_default(capability: &str, outcome: MockOutcome) -> Self {
        Self {
            capability: capability.to_string(),
            latency: Duration::ZERO,
            default_outcome: Arc::new(RwLock::new(outcome)),
            script: Arc::new(RwLock::new(VecDeque::new())),
            call_history: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulated time spent in every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the outcome used once the script is exhausted.
    pub async fn set_default(&self, outcome: MockOutcome) {
        *self.default_outcome.write().await = outcome;
    }

    /// Queue outcomes for the next calls, in order.
    pub async fn script<I>(&self, outcomes: I)
    where
        I: IntoIterator<Item = MockOutcome>,
    {
        self.script.write().await.extend(outcomes);
    }

    /// Retrieve the inputs of all calls made to this agent
    pub async fn history(&self) -> Vec<Value> {
        self.call_history.read().await.clone()
    }

    /// Check the total number of times this agent was executed
    pub async fn call_count(&self) -> usize {
        self.call_history.read().await.len()
    }

    /// Highest number of calls that were running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn capability(&self) -> &str {
        &self.capability
    }

    fn description(&self) -> Option<&str> {
        Some("mock agent")
    }

    async fn execute(&self, input: Value) -> AgentResult<Value> {
        self.call_history.write().await.push(input.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.script.write().await.pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => self.default_outcome.read().await.clone(),
        };

        match outcome {
            MockOutcome::Echo => Ok(json!({ "capability": self.capability, "input": input })),
            MockOutcome::Succeed(value) => Ok(value),
            MockOutcome::Fail(message) => Err(AgentError::ExecutionFailed(message)),
        }
    }
}

#[macro_export]
macro_rules! assert_agent_called {
    ($agent:expr, $expected_count:expr) => {
        let count = $agent.call_count().await;
        assert_eq!(
            count,
            $expected_count,
            "Expected agent '{}' to be called {} times, but was called {} times",
            $crate::agent::capability_of(&$agent),
            $expected_count,
            count
        );
    };
}

#[doc(hidden)]
pub fn capability_of(agent: &MockAgent) -> &str {
    agent.capability()
}
