//! Run results, status reports and cumulative metrics

use chrono::{DateTime, Utc};
use conductor_kernel::{RunMetrics, RunStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Key under which graph problems are reported in [`WorkflowResult::errors`]
pub const DEPENDENCY_ERROR_KEY: &str = "dependency";

/// Terminal result of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub status: RunStatus,
    /// Output per successful task id
    pub results: HashMap<String, Value>,
    /// Error message per failed task id (or [`DEPENDENCY_ERROR_KEY`])
    pub errors: HashMap<String, String>,
    pub metrics: RunMetrics,
}

impl WorkflowResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn output(&self, task_id: &str) -> Option<&Value> {
        self.results.get(task_id)
    }

    pub fn error(&self, task_id: &str) -> Option<&str> {
        self.errors.get(task_id).map(String::as_str)
    }

    /// Graph problem reported instead of running, if any
    pub fn dependency_error(&self) -> Option<&str> {
        self.error(DEPENDENCY_ERROR_KEY)
    }
}

/// Bookkeeping for a workflow that is currently running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWorkflowEntry {
    pub workflow_id: String,
    pub started_at: DateTime<Utc>,
    pub cancelled: bool,
}

/// Answer of `get_workflow_status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStatusReport {
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
}

/// Cumulative orchestrator counters
#[derive(Debug, Default)]
pub struct OrchestratorMetrics {
    workflows_executed: AtomicU64,
    workflows_failed: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    total_execution_time_ms: AtomicU64,
}

impl OrchestratorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_run(&self, result: &WorkflowResult) {
        self.workflows_executed.fetch_add(1, Ordering::Relaxed);
        if !result.is_success() {
            self.workflows_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.tasks_completed
            .fetch_add(result.metrics.tasks_completed as u64, Ordering::Relaxed);
        let failed_tasks = result
            .errors
            .keys()
            .filter(|k| k.as_str() != DEPENDENCY_ERROR_KEY)
            .count();
        self.tasks_failed
            .fetch_add(failed_tasks as u64, Ordering::Relaxed);
        self.total_execution_time_ms
            .fetch_add(result.metrics.total_time_ms, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.workflows_executed.store(0, Ordering::Relaxed);
        self.workflows_failed.store(0, Ordering::Relaxed);
        self.tasks_completed.store(0, Ordering::Relaxed);
        self.tasks_failed.store(0, Ordering::Relaxed);
        self.total_execution_time_ms.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OrchestratorMetricsSnapshot {
        OrchestratorMetricsSnapshot {
            workflows_executed: self.workflows_executed.load(Ordering::Relaxed),
            workflows_failed: self.workflows_failed.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            total_execution_time_ms: self.total_execution_time_ms.load(Ordering::Relaxed),
        }
    }
}

/// Serializable view of [`OrchestratorMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorMetricsSnapshot {
    pub workflows_executed: u64,
    pub workflows_failed: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub total_execution_time_ms: u64,
}
