//! 工作流生命周期事件
//! Workflow lifecycle events
//!
//! A closed set of tagged variants. Each event is validated before it is
//! handed to a bus, and serializes to the `{ "type": ..., "data": ... }`
//! envelope that subscribers expect.

use super::error::BusError;
use crate::workflow::{RunMetrics, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 工作流生命周期事件
/// Workflow lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[non_exhaustive]
pub enum WorkflowEvent {
    /// 工作流开始
    /// Workflow started
    #[serde(rename = "workflow.started")]
    Started {
        workflow_id: String,
        name: String,
        tasks_count: usize,
        timestamp: DateTime<Utc>,
    },
    /// 工作流结束（完成、失败或超时）
    /// Workflow finished (completed, failed or timed out)
    #[serde(rename = "workflow.completed")]
    Completed {
        workflow_id: String,
        status: RunStatus,
        metrics: RunMetrics,
        timestamp: DateTime<Utc>,
    },
    /// 工作流被取消
    /// Workflow cancelled
    #[serde(rename = "workflow.cancelled")]
    Cancelled {
        workflow_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    pub fn started(workflow_id: impl Into<String>, name: impl Into<String>, tasks_count: usize) -> Self {
        Self::Started {
            workflow_id: workflow_id.into(),
            name: name.into(),
            tasks_count,
            timestamp: Utc::now(),
        }
    }

    pub fn completed(workflow_id: impl Into<String>, status: RunStatus, metrics: RunMetrics) -> Self {
        Self::Completed {
            workflow_id: workflow_id.into(),
            status,
            metrics,
            timestamp: Utc::now(),
        }
    }

    pub fn cancelled(workflow_id: impl Into<String>) -> Self {
        Self::Cancelled {
            workflow_id: workflow_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// 事件类型字符串
    /// Event type string, e.g. `workflow.started`
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "workflow.started",
            Self::Completed { .. } => "workflow.completed",
            Self::Cancelled { .. } => "workflow.cancelled",
        }
    }

    pub fn workflow_id(&self) -> &str {
        match self {
            Self::Started { workflow_id, .. }
            | Self::Completed { workflow_id, .. }
            | Self::Cancelled { workflow_id, .. } => workflow_id,
        }
    }

    /// 发布前校验
    /// Validate before publishing
    pub fn validate(&self) -> Result<(), BusError> {
        let invalid = |reason: &str| BusError::InvalidEvent {
            event_type: self.event_type().to_string(),
            reason: reason.to_string(),
        };

        if self.workflow_id().trim().is_empty() {
            return Err(invalid("workflow_id must not be empty"));
        }

        match self {
            Self::Started { name, .. } if name.trim().is_empty() => {
                Err(invalid("name must not be empty"))
            }
            Self::Completed { status, .. } if *status == RunStatus::Cancelled => {
                Err(invalid("cancelled runs publish workflow.cancelled"))
            }
            Self::Completed { metrics, .. } if metrics.tasks_completed > metrics.tasks_total => {
                Err(invalid("tasks_completed exceeds tasks_total"))
            }
            _ => Ok(()),
        }
    }

    /// 序列化为 JSON
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<serde_json::Value, BusError> {
        serde_json::to_value(self).map_err(|e| BusError::Serialization(e.to_string()))
    }
}
