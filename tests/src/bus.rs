use async_trait::async_trait;
use conductor_kernel::bus::{BusError, EventBus, WorkflowEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// An event bus that keeps every published event for later assertions
///
/// Events are validated like a real bus would. With `fail_publishes` set,
/// valid events are still recorded but every publish reports an error.
#[derive(Clone, Default)]
pub struct RecordingEventBus {
    events: Arc<RwLock<Vec<WorkflowEvent>>>,
    fail_publishes: Arc<AtomicBool>,
}

impl RecordingEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus whose publishes always fail
    pub fn failing() -> Self {
        let bus = Self::default();
        bus.fail_publishes.store(true, Ordering::SeqCst);
        bus
    }

    pub async fn events(&self) -> Vec<WorkflowEvent> {
        self.events.read().await.clone()
    }

    /// Event type names in publish order
    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events.read().await.iter().map(WorkflowEvent::event_type).collect()
    }

    /// Events published for one workflow id
    pub async fn events_for(&self, workflow_id: &str) -> Vec<WorkflowEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.workflow_id() == workflow_id)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: WorkflowEvent) -> Result<(), BusError> {
        event.validate()?;
        self.events.write().await.push(event);
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(BusError::SendFailed("recording bus configured to fail".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_events_in_order() {
        let bus = RecordingEventBus::new();
        bus.publish(WorkflowEvent::started("wf", "WF", 1)).await.unwrap();
        bus.publish(WorkflowEvent::cancelled("wf")).await.unwrap();

        assert_eq!(bus.event_types().await, vec!["workflow.started", "workflow.cancelled"]);
        assert_eq!(bus.events_for("wf").await.len(), 2);
        assert!(bus.events_for("other").await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_event_is_not_recorded() {
        let bus = RecordingEventBus::new();
        assert!(bus.publish(WorkflowEvent::started("", "WF", 1)).await.is_err());
        assert!(bus.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_bus_still_records() {
        let bus = RecordingEventBus::failing();
        assert!(bus.publish(WorkflowEvent::cancelled("wf")).await.is_err());
        assert_eq!(bus.events().await.len(), 1);
    }
}
