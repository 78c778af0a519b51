//! 工作流模块
//! Workflow module
//!
//! 数据模型、构建器、依赖图和任务执行器
//! Data model, builder, dependency graph and task executor
//!
//! ```text
//! WorkflowBuilder --build()--> Workflow --WorkflowGraph::levels()--> [[Task]]
//!                                                                      |
//!                                      TaskExecutor (breaker per capability)
//! ```

mod builder;
mod executor;
mod graph;
mod model;

pub use builder::{
    CodeAnalysisInput, DocumentationInput, SecurityEvaluationInput, TaskOptions,
    TestGenerationInput, WorkflowBuilder, capability,
};
pub use executor::{CapabilityPolicy, TaskExecutor, TaskOutcome};
pub use graph::WorkflowGraph;
pub use model::{Task, TaskSpec, Workflow, WorkflowSpec};
