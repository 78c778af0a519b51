//! Orchestrator error taxonomy.
//!
//! Misuse (bad build, duplicate run, unknown capability) surfaces as one of
//! these errors. Task-level failures never do: the orchestrator records them
//! in the run result instead.

use thiserror::Error;

/// Result alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Errors raised by workflow construction and orchestration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// Workflow failed build-time validation (missing id/name, duplicate task ids).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A task references a capability that no registered agent provides.
    #[error("Unknown capability '{capability}' for task '{task_id}'")]
    UnknownCapability { capability: String, task_id: String },

    /// The task dependency graph is unsatisfiable (cycle or dangling reference).
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// A workflow with the same id is already running.
    #[error("Workflow '{0}' is already running")]
    DuplicateRun(String),

    /// An agent call failed.
    #[error("Task '{task_id}' failed: {message}")]
    Execution { task_id: String, message: String },

    /// A circuit breaker rejected the call without invoking the agent.
    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    /// A workflow or per-call deadline was exceeded.
    #[error("Timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

impl OrchestratorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unknown_capability(capability: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self::UnknownCapability {
            capability: capability.into(),
            task_id: task_id.into(),
        }
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency(message.into())
    }
}
