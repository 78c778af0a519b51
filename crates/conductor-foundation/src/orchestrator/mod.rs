//! Workflow Orchestrator Module
//!
//! Top-level coordinator of workflow runs:
//! - Agent registry keyed by capability
//! - Duplicate-run guarding and cooperative cancellation
//! - Sequential or bounded-parallel execution with fail-fast
//! - Workflow timeouts with partial results
//! - Lifecycle events and cumulative metrics
//!
//! ```rust,ignore
//! use conductor_foundation::orchestrator::{Orchestrator, OrchestratorConfig};
//! use conductor_foundation::workflow::{WorkflowBuilder, CodeAnalysisInput, TaskOptions};
//!
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default());
//! orchestrator.register_agent(Arc::new(MyAnalysisAgent::new()));
//!
//! let workflow = WorkflowBuilder::create("review-42", "Review PR 42")
//!     .code_analysis(CodeAnalysisInput { code, ..Default::default() }, TaskOptions::new())
//!     .build()?;
//! let result = orchestrator.execute_workflow(&workflow).await?;
//! ```

mod config;
mod engine;
mod registry;
mod result;

pub use config::{CapabilityConfig, CyclePolicy, OrchestratorConfig};
pub use engine::Orchestrator;
pub use registry::AgentRegistry;
pub use result::{
    ActiveWorkflowEntry, DEPENDENCY_ERROR_KEY, OrchestratorMetrics, OrchestratorMetricsSnapshot,
    WorkflowResult, WorkflowStatusReport,
};
