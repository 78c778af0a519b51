//! 生命周期事件总线
//! Lifecycle event bus
//!
//! The orchestrator publishes [`WorkflowEvent`]s fire-and-forget: a failed
//! publish is logged and never affects the run.

mod error;
mod event;

pub use error::BusError;
pub use event::WorkflowEvent;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// 事件总线 Trait
/// Event bus trait
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 发布事件
    /// Publish an event
    async fn publish(&self, event: WorkflowEvent) -> Result<(), BusError>;
}

/// 基于 broadcast 通道的进程内事件总线
/// In-process event bus backed by a broadcast channel
#[derive(Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅事件
    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: WorkflowEvent) -> Result<(), BusError> {
        event.validate()?;
        let event_type = event.event_type();
        // No subscribers is not an error for a fire-and-forget bus
        match self.sender.send(event) {
            Ok(receivers) => debug!(event_type, receivers, "event published"),
            Err(_) => debug!(event_type, "event dropped: no subscribers"),
        }
        Ok(())
    }
}
