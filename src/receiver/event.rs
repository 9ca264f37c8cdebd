use crate::context::ForwardingContext;
use crate::error::{HaError, Result};
use crate::event::DomainEvent;
use async_trait::async_trait;
use std::sync::Arc;

/// The local event bus.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn post(&self, event: DomainEvent) -> Result<()>;
}

/// Re-publishes events forwarded by the peer on the local bus.
pub struct EventReceiver {
    sink: Arc<dyn EventSink>,
}

impl EventReceiver {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        EventReceiver { sink }
    }

    pub async fn apply(&self, event: DomainEvent) -> Result<()> {
        let event_type = event.event_type.clone();
        ForwardingContext::scope(self.sink.post(event))
            .await
            .map_err(|e| match e {
                e @ HaError::LocalApply { .. } => e,
                other => HaError::local_apply("event", &event_type, other),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Bus {
        posted: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl EventSink for Bus {
        async fn post(&self, event: DomainEvent) -> Result<()> {
            self.posted
                .lock()
                .unwrap()
                .push((event.event_type, ForwardingContext::is_forwarded()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_posts_under_forwarding_context() {
        let bus = Arc::new(Bus::default());
        let receiver = EventReceiver::new(bus.clone());
        receiver
            .apply(DomainEvent::for_project("ref-updated", "demo", json!({})))
            .await
            .unwrap();
        assert_eq!(
            bus.posted.lock().unwrap().clone(),
            vec![("ref-updated".to_string(), true)]
        );
        assert!(!ForwardingContext::is_forwarded());
    }
}
