use super::{DispatchOutcome, ForwardingQueue, QueueStats};
use crate::config::IndexConfig;
use crate::context::ForwardingContext;
use crate::event::{IndexMeta, IndexOperation, ReplicationEvent};
use crate::forwarder::Forwarder;
use std::sync::Arc;

/// Forwards local index and delete notifications of every entity kind.
pub struct IndexEventDispatcher {
    node_id: String,
    queue: ForwardingQueue,
}

impl IndexEventDispatcher {
    pub fn new(config: &IndexConfig, forwarder: Arc<Forwarder>) -> Self {
        let node_id = forwarder.node_id().to_string();
        let queue = ForwardingQueue::start(
            "index",
            forwarder,
            config.thread_pool_size,
            config.queue_capacity,
        );
        IndexEventDispatcher { node_id, queue }
    }

    /// Called by the local indexer after it (re)indexed or deleted `id`.
    pub fn on_index(
        &self,
        kind: &str,
        id: &str,
        operation: IndexOperation,
        meta: Option<IndexMeta>,
    ) -> DispatchOutcome {
        if ForwardingContext::is_forwarded() {
            return DispatchOutcome::SkippedForwarded;
        }
        let meta = meta.or_else(|| match operation {
            IndexOperation::Index => Some(IndexMeta::now(&self.node_id)),
            IndexOperation::Delete => None,
        });
        self.queue
            .submit(ReplicationEvent::index_mutation(kind, id, operation, meta))
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    pub async fn shutdown(self) {
        self.queue.shutdown().await
    }
}
