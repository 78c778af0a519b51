//! 任务执行器
//! Task Executor
//!
//! 通过能力对应的熔断器调用 Agent，记录耗时和结果。
//! Invokes a task's agent through the circuit breaker registered for its
//! capability and records timing and outcome. Agent failures and breaker
//! rejections come back as data, never as a panic or an early return.

use super::model::Task;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry};
use conductor_kernel::agent::{Agent, AgentError, AgentResult};
use conductor_kernel::OrchestratorError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info_span, warn};

/// 能力执行策略
/// Per-capability execution policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityPolicy {
    /// 首次创建该能力熔断器时使用的配置
    /// Breaker config used when the capability's breaker is first created
    pub breaker: Option<CircuitBreakerConfig>,
    /// 是否使用 `call_with_retry`
    pub retry: bool,
    /// 单次调用超时
    pub call_timeout: Option<Duration>,
}

/// 单个任务的执行结果
/// Outcome of one task execution
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub capability: String,
    /// 是否真正调用了 Agent（熔断拒绝时为 false）
    /// Whether the agent was actually invoked
    pub invoked: bool,
    pub duration: Duration,
    pub result: Result<Value, OrchestratorError>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// 写入 `errors[task_id]` 的错误信息
    /// Message recorded under the task id on failure
    pub fn error_message(&self) -> Option<String> {
        match &self.result {
            Ok(_) => None,
            Err(OrchestratorError::Execution { message, .. }) => Some(message.clone()),
            Err(other) => Some(other.to_string()),
        }
    }

    /// 任务异常终止（panic）
    pub(crate) fn aborted(task: &Task, reason: impl Into<String>) -> Self {
        Self::failed_with(task, reason.into(), true)
    }

    /// 任务未被派发（Agent 从未运行）
    /// The task failed before its agent could run
    pub(crate) fn not_dispatched(task: &Task, reason: impl Into<String>) -> Self {
        Self::failed_with(task, reason.into(), false)
    }

    fn failed_with(task: &Task, message: String, invoked: bool) -> Self {
        Self {
            task_id: task.id.clone(),
            capability: task.agent_type.clone(),
            invoked,
            duration: Duration::ZERO,
            result: Err(OrchestratorError::Execution {
                task_id: task.id.clone(),
                message,
            }),
        }
    }
}

/// 任务执行器
pub struct TaskExecutor {
    breakers: Arc<CircuitBreakerRegistry>,
    default_breaker: CircuitBreakerConfig,
    policies: HashMap<String, CapabilityPolicy>,
}

impl TaskExecutor {
    /// 创建执行器
    pub fn new(breakers: Arc<CircuitBreakerRegistry>) -> Self {
        let default_breaker = breakers.default_config().clone();
        Self {
            breakers,
            default_breaker,
            policies: HashMap::new(),
        }
    }

    /// 设置默认熔断配置
    pub fn with_default_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.default_breaker = config;
        self
    }

    /// 设置能力策略
    pub fn with_policy(mut self, capability: impl Into<String>, policy: CapabilityPolicy) -> Self {
        self.policies.insert(capability.into(), policy);
        self
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn policy(&self, capability: &str) -> Option<&CapabilityPolicy> {
        self.policies.get(capability)
    }

    /// 获取能力对应的熔断器
    /// Breaker guarding `capability`
    pub fn breaker_for(&self, capability: &str) -> Arc<CircuitBreaker> {
        let config = self
            .policies
            .get(capability)
            .and_then(|p| p.breaker.clone())
            .unwrap_or_else(|| self.default_breaker.clone());
        self.breakers.get_or_create(capability, config)
    }

    /// 执行任务
    /// Execute `task` with `agent`
    pub async fn execute(&self, task: &Task, agent: Arc<dyn Agent>) -> TaskOutcome {
        let span = info_span!("task", task_id = %task.id, capability = %task.agent_type);
        self.run(task, agent).instrument(span).await
    }

    async fn run(&self, task: &Task, agent: Arc<dyn Agent>) -> TaskOutcome {
        let breaker = self.breaker_for(&task.agent_type);
        let policy = self.policies.get(&task.agent_type);
        let retry = policy.is_some_and(|p| p.retry);
        let call_timeout = policy.and_then(|p| p.call_timeout);

        let invoked = AtomicBool::new(false);
        let attempt = || {
            invoked.store(true, Ordering::Relaxed);
            invoke(agent.as_ref(), task.input.clone(), call_timeout)
        };

        debug!(retry, "Dispatching task");
        let start = Instant::now();
        let result = if retry {
            breaker.call_with_retry(attempt).await
        } else {
            breaker.call(attempt).await
        };
        let duration = start.elapsed();

        let result = match result {
            Ok(output) => {
                debug!(elapsed_ms = duration.as_millis() as u64, "Task completed");
                Ok(output)
            }
            Err(CircuitBreakerError::CircuitOpen { name }) => {
                warn!(breaker = %name, "Task rejected by open circuit");
                Err(OrchestratorError::CircuitOpen(name))
            }
            Err(CircuitBreakerError::Operation(e)) => {
                warn!(error = %e, elapsed_ms = duration.as_millis() as u64, "Task failed");
                Err(OrchestratorError::Execution {
                    task_id: task.id.clone(),
                    message: e.to_string(),
                })
            }
        };

        TaskOutcome {
            task_id: task.id.clone(),
            capability: task.agent_type.clone(),
            invoked: invoked.load(Ordering::Relaxed),
            duration,
            result,
        }
    }
}

async fn invoke(agent: &dyn Agent, input: Value, limit: Option<Duration>) -> AgentResult<Value> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, agent.execute(input))
            .await
            .unwrap_or(Err(AgentError::Timeout {
                duration_ms: limit.as_millis() as u64,
            })),
        None => agent.execute(input).await,
    }
}
