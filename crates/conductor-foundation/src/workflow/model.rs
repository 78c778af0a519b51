//! 工作流数据模型
//! Workflow data model
//!
//! [`Workflow`] 只能由 [`WorkflowBuilder`](super::WorkflowBuilder) 构建，构建后不可变。
//! A [`Workflow`] is only produced by the builder and is immutable afterwards.
//! [`WorkflowSpec`] is the serde submission shape that feeds the builder.

use conductor_kernel::config::load_config;
use conductor_kernel::{IntoKernelReport, KernelResult};
use error_stack::ResultExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// 任务
/// A single unit of work bound to an agent capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// 能力名称
    /// Capability name resolved against the agent registry
    pub agent_type: String,
    pub input: Value,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl Task {
    /// 调度优先级（缺省为 0）
    /// Scheduling priority, 0 when absent
    pub fn effective_priority(&self) -> i32 {
        self.priority.unwrap_or(0)
    }
}

/// 工作流
/// A validated, immutable workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workflow {
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    parallel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    tasks: Vec<Task>,
}

impl Workflow {
    pub(crate) fn new(
        id: String,
        name: String,
        description: Option<String>,
        parallel: bool,
        timeout_ms: Option<u64>,
        tasks: Vec<Task>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            parallel,
            timeout_ms,
            tasks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// 工作流使用的能力（去重，按首次出现排序）
    /// Distinct capabilities in declaration order
    pub fn capabilities(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tasks
            .iter()
            .map(|t| t.agent_type.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// 转回提交格式
    /// Convert back to the submission shape
    pub fn to_spec(&self) -> WorkflowSpec {
        WorkflowSpec {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            parallel: self.parallel,
            timeout_ms: self.timeout_ms,
            tasks: self
                .tasks
                .iter()
                .map(|t| TaskSpec {
                    id: Some(t.id.clone()),
                    agent_type: t.agent_type.clone(),
                    input: t.input.clone(),
                    depends_on: t.depends_on.clone(),
                    priority: t.priority,
                })
                .collect(),
        }
    }
}

/// 工作流提交格式
/// Workflow submission shape
///
/// Missing `id`/`name` deserialize as empty strings so that the builder
/// reports them as validation errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default, alias = "timeoutMs", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

impl WorkflowSpec {
    /// 从 JSON 字符串解析
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> KernelResult<Self> {
        serde_json::from_str(json)
            .into_report()
            .attach("parsing workflow submission")
    }

    /// 从配置文件加载（YAML/TOML/JSON/...）
    /// Load from a file in any supported config format
    pub fn from_file(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        load_config(path)
            .into_report()
            .attach(format!("loading workflow from {}", path.display()))
    }
}

/// 任务提交格式
/// Task submission shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "agentType")]
    pub agent_type: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default, alias = "dependsOn")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl TaskSpec {
    pub fn new(agent_type: impl Into<String>, input: Value) -> Self {
        Self {
            agent_type: agent_type.into(),
            input,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
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

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}
