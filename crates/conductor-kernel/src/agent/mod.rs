//! Agent 能力契约
//! Agent capability contract
//!
//! 编排器只依赖 [`Agent`] 的能力名称和 `execute` 方法。
//! The orchestrator depends on nothing but an agent's capability name and its
//! `execute` method. Concrete capabilities (code analysis, test generation,
//! documentation, security evaluation, ...) live outside the engine.

pub mod error;

pub use error::{AgentError, AgentResult};

use async_trait::async_trait;
use serde_json::Value;

/// Agent Trait
///
/// 一个 Agent 暴露唯一的能力，编排器按能力名称分派任务。
/// An agent exposes exactly one capability; the orchestrator dispatches tasks
/// to it by capability name.
///
/// # Example
///
/// ```rust,ignore
/// use conductor_kernel::agent::{Agent, AgentResult};
/// use serde_json::{json, Value};
///
/// struct EchoAgent;
///
/// #[async_trait::async_trait]
/// impl Agent for EchoAgent {
///     fn capability(&self) -> &str {
///         "echo"
///     }
///
///     async fn execute(&self, input: Value) -> AgentResult<Value> {
///         Ok(json!({ "echo": input }))
///     }
/// }
/// ```
#[async_trait]
pub trait Agent: Send + Sync {
    /// 能力名称（注册表键）
    /// Capability name (registry key)
    fn capability(&self) -> &str;

    /// 执行任务输入
    /// Execute a task input
    async fn execute(&self, input: Value) -> AgentResult<Value>;

    /// 描述
    /// Description
    fn description(&self) -> Option<&str> {
        None
    }
}
