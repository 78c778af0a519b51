//! Conductor Foundation
//!
//! The concrete workflow engine built on the `conductor-kernel` contracts:
//!
//! - [`circuit_breaker`]: per-dependency breakers with retry, presets and a registry
//! - [`workflow`]: workflow model, fluent builder, dependency graph and task executor
//! - [`orchestrator`]: the orchestrator that runs workflows end to end

// Circuit breaker module - state machine, retry and registry
pub mod circuit_breaker;

// workflow module
pub mod workflow;

// orchestrator module
pub mod orchestrator;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry, State,
};

// Re-export workflow types
pub use workflow::{Task, TaskSpec, Workflow, WorkflowBuilder, WorkflowGraph, WorkflowSpec};

// Re-export orchestrator types
pub use orchestrator::{Orchestrator, OrchestratorConfig, WorkflowResult};

// Re-export kernel contracts used in the public API
pub use conductor_kernel::{Agent, AgentError, EventBus, OrchestratorError, RunStatus, WorkflowEvent};
