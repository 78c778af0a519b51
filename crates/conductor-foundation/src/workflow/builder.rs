//! 工作流构建器
//!
//! 提供流式 API 构建工作流
//! Fluent API for assembling a [`Workflow`]

use super::model::{Task, TaskSpec, Workflow, WorkflowSpec};
use conductor_kernel::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

/// 已知能力名称
/// Well-known capability names
pub mod capability {
    pub const CODE_ANALYSIS: &str = "code_analysis";
    pub const TEST_GENERATION: &str = "test_generation";
    pub const DOCUMENTATION: &str = "documentation";
    pub const SECURITY_EVALUATION: &str = "security_evaluation";
}

/// 便捷方法的可选任务参数
/// Optional task settings accepted by the capability wrappers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskOptions {
    pub id: Option<String>,
    pub depends_on: Vec<String>,
    pub priority: Option<i32>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// 代码分析输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeAnalysisInput {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus: Vec<String>,
}

/// 测试生成输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestGenerationInput {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_target: Option<f64>,
}

/// 文档生成输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentationInput {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

/// 安全评估输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvaluationInput {
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub standards: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_threshold: Option<String>,
}

/// 工作流构建器
#[derive(Debug, Clone, Default)]
pub struct WorkflowBuilder {
    id: String,
    name: String,
    description: Option<String>,
    parallel: bool,
    timeout_ms: Option<u64>,
    tasks: Vec<TaskSpec>,
}

impl WorkflowBuilder {
    /// 创建新的工作流构建器
    /// Start a builder for workflow `id` named `name`
    pub fn create(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// 从提交格式创建
    /// Start from a submitted [`WorkflowSpec`]; validation happens in `build()`
    pub fn from_spec(spec: WorkflowSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            description: spec.description,
            parallel: spec.parallel,
            timeout_ms: spec.timeout_ms,
            tasks: spec.tasks,
        }
    }

    /// 设置描述
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// 是否并行执行
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// 设置整体超时
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// 设置整体超时（毫秒）
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// 添加任务
    /// Append a task
    pub fn add_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    /// 添加指定能力的任务
    /// Append a task for `capability` with settings from `options`
    pub fn add_capability_task(
        self,
        capability: impl Into<String>,
        input: Value,
        options: TaskOptions,
    ) -> Self {
        self.add_task(TaskSpec {
            id: options.id,
            agent_type: capability.into(),
            input,
            depends_on: options.depends_on,
            priority: options.priority,
        })
    }

    /// 代码分析任务
    pub fn code_analysis(self, input: CodeAnalysisInput, options: TaskOptions) -> Self {
        self.typed_task(capability::CODE_ANALYSIS, &input, options)
    }

    /// 测试生成任务
    pub fn test_generation(self, input: TestGenerationInput, options: TaskOptions) -> Self {
        self.typed_task(capability::TEST_GENERATION, &input, options)
    }

    /// 文档生成任务
    pub fn documentation(self, input: DocumentationInput, options: TaskOptions) -> Self {
        self.typed_task(capability::DOCUMENTATION, &input, options)
    }

    /// 安全评估任务
    pub fn security_evaluation(self, input: SecurityEvaluationInput, options: TaskOptions) -> Self {
        self.typed_task(capability::SECURITY_EVALUATION, &input, options)
    }

    fn typed_task<I: Serialize>(self, capability: &str, input: &I, options: TaskOptions) -> Self {
        // plain structs of strings and numbers always serialize
        let input = serde_json::to_value(input).unwrap_or(Value::Null);
        self.add_capability_task(capability, input, options)
    }

    /// 构建工作流
    /// Validate and produce the immutable [`Workflow`]
    ///
    /// Fails when `id` or `name` is empty, when a task has no capability,
    /// when two tasks share an explicit id, or when the timeout is zero.
    /// Tasks without an id get a generated one that cannot collide with any
    /// other id in the workflow.
    pub fn build(self) -> OrchestratorResult<Workflow> {
        let id = self.id.trim().to_string();
        let name = self.name.trim().to_string();
        if id.is_empty() {
            return Err(OrchestratorError::validation("workflow id is required"));
        }
        if name.is_empty() {
            return Err(OrchestratorError::validation(format!(
                "workflow '{}' requires a name",
                id
            )));
        }
        if self.timeout_ms == Some(0) {
            return Err(OrchestratorError::validation(format!(
                "workflow '{}' timeout must be positive",
                id
            )));
        }

        let mut used: HashSet<String> = HashSet::new();
        for (index, task) in self.tasks.iter().enumerate() {
            if task.agent_type.trim().is_empty() {
                return Err(OrchestratorError::validation(format!(
                    "task #{} in workflow '{}' has no agent type",
                    index + 1,
                    id
                )));
            }
            if let Some(task_id) = explicit_id(task) {
                if !used.insert(task_id.to_string()) {
                    return Err(OrchestratorError::validation(format!(
                        "duplicate task id '{}' in workflow '{}'",
                        task_id, id
                    )));
                }
            }
        }

        let tasks = self
            .tasks
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                let task_id = match explicit_id(&spec) {
                    Some(explicit) => explicit.to_string(),
                    None => generate_task_id(index, &mut used),
                };
                Task {
                    id: task_id,
                    agent_type: spec.agent_type.trim().to_string(),
                    input: spec.input,
                    depends_on: spec.depends_on,
                    priority: spec.priority,
                }
            })
            .collect();

        Ok(Workflow::new(
            id,
            name,
            self.description,
            self.parallel,
            self.timeout_ms,
            tasks,
        ))
    }
}

fn explicit_id(task: &TaskSpec) -> Option<&str> {
    task.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
}

/// 生成唯一任务 ID
fn generate_task_id(index: usize, used: &mut HashSet<String>) -> String {
    loop {
        let uuid = Uuid::new_v4().simple().to_string();
        let candidate = format!("task-{}-{}", index + 1, &uuid[..8]);
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
}
