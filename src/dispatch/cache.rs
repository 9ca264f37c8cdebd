use super::{DispatchOutcome, ForwardingQueue, QueueStats};
use crate::config::CacheConfig;
use crate::context::ForwardingContext;
use crate::error::Result;
use crate::event::{CacheRemoval, RemovalCause, ReplicationEvent};
use crate::forwarder::Forwarder;
use crate::pattern::PatternMatcher;
use std::sync::Arc;

/// Forwards explicit invalidations of allow-listed caches.
pub struct CacheEvictionDispatcher {
    matcher: PatternMatcher,
    queue: ForwardingQueue,
}

impl CacheEvictionDispatcher {
    pub fn new(config: &CacheConfig, forwarder: Arc<Forwarder>) -> Result<Self> {
        let matcher = PatternMatcher::for_caches(&config.patterns)?;
        let queue = ForwardingQueue::start(
            "cache",
            forwarder,
            config.thread_pool_size,
            config.queue_capacity,
        );
        Ok(CacheEvictionDispatcher { matcher, queue })
    }

    /// Removal listener for the local cache implementation.
    pub fn on_removal(&self, removal: &CacheRemoval) -> DispatchOutcome {
        if ForwardingContext::is_forwarded() {
            return DispatchOutcome::SkippedForwarded;
        }
        if removal.cause != RemovalCause::Explicit {
            return DispatchOutcome::SkippedNotExplicit;
        }
        if !self.matcher.matches(&removal.cache_name) {
            return DispatchOutcome::SkippedFiltered;
        }
        self.queue.submit(ReplicationEvent::cache_evict(
            removal.cache_name.clone(),
            removal.key.clone(),
        ))
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub async fn shutdown(self) {
        self.queue.shutdown().await
    }
}
