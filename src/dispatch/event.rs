use super::{DispatchOutcome, ForwardingQueue, QueueStats};
use crate::config::EventConfig;
use crate::context::ForwardingContext;
use crate::error::Result;
use crate::event::{DomainEvent, ReplicationEvent};
use crate::forwarder::Forwarder;
use crate::pattern::PatternMatcher;
use std::sync::Arc;

/// Forwards project-scoped domain events whose type is allow-listed.
pub struct EventDispatcher {
    matcher: PatternMatcher,
    queue: ForwardingQueue,
}

impl EventDispatcher {
    pub fn new(config: &EventConfig, forwarder: Arc<Forwarder>) -> Result<Self> {
        let matcher = PatternMatcher::allow_all_when_empty(&config.patterns)?;
        let queue = ForwardingQueue::start(
            "event",
            forwarder,
            config.thread_pool_size,
            config.queue_capacity,
        );
        Ok(EventDispatcher { matcher, queue })
    }

    /// Listener for the local event bus.
    pub fn on_event(&self, event: &DomainEvent) -> DispatchOutcome {
        if ForwardingContext::is_forwarded() {
            return DispatchOutcome::SkippedForwarded;
        }
        if !event.is_project_scoped() || !self.matcher.matches(&event.event_type) {
            return DispatchOutcome::SkippedFiltered;
        }
        self.queue
            .submit(ReplicationEvent::DomainEvent(event.clone()))
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub async fn shutdown(self) {
        self.queue.shutdown().await
    }
}
