//! 工作流运行结果的值类型
//! Value types describing a workflow run
//!
//! These are shared between the orchestrator (which produces them) and the
//! event bus (which carries them in `workflow.completed` notifications).

pub mod error;

pub use error::{OrchestratorError, OrchestratorResult};

use serde::{Deserialize, Serialize};
use std::fmt;

/// 工作流终态
/// Terminal status of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// 全部任务成功
    /// Every task succeeded
    Completed,
    /// 至少一个任务失败，或依赖图不可满足
    /// At least one task failed, or the dependency graph is unsatisfiable
    Failed,
    /// 运行中被取消
    /// Cancelled mid-run
    Cancelled,
    /// 超过工作流级超时
    /// Exceeded the workflow-level deadline
    Timeout,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次运行的聚合指标
/// Aggregate metrics of a single run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// 成功完成的任务数
    /// Number of tasks that completed successfully
    pub tasks_completed: usize,
    /// 工作流中的任务总数
    /// Total number of tasks in the workflow
    pub tasks_total: usize,
    /// 总耗时（毫秒）
    /// Wall-clock time of the run (milliseconds)
    pub total_time_ms: u64,
    /// 实际调用过的能力（去重，排序）
    /// Distinct capability names actually invoked (sorted)
    pub agents_used: Vec<String>,
}
