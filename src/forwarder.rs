use crate::event::{
    DomainEvent, IndexMeta, IndexOperation, ReplicationEvent, ACCOUNT_INDEX, CHANGE_INDEX,
    GROUP_INDEX, PROJECT_INDEX,
};
use crate::peers::{PeerAddress, PeerResolver};
use crate::transport::{ForwardingOutcome, ReplicationTransport};
use std::sync::Arc;

/// Outcome of one forward together with the peer it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub peer: Option<PeerAddress>,
    pub outcome: ForwardingOutcome,
}

/// Outbound façade: resolves the peer, builds the event, hands it to the
/// transport. Holds no state between calls.
pub struct Forwarder {
    node_id: String,
    resolver: Arc<dyn PeerResolver>,
    transport: Arc<dyn ReplicationTransport>,
}

impl Forwarder {
    pub fn new(
        node_id: impl Into<String>,
        resolver: Arc<dyn PeerResolver>,
        transport: Arc<dyn ReplicationTransport>,
    ) -> Self {
        Forwarder {
            node_id: node_id.into(),
            resolver,
            transport,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn resolver(&self) -> &Arc<dyn PeerResolver> {
        &self.resolver
    }

    /// Send `event` to the current peer. Without a peer nothing goes out.
    pub async fn forward(&self, event: &ReplicationEvent) -> Delivery {
        let Some(peer) = self.resolver.resolve() else {
            return Delivery {
                peer: None,
                outcome: ForwardingOutcome::PeerUnavailable,
            };
        };
        let outcome = self.transport.send(&peer, event).await;
        Delivery {
            peer: Some(peer),
            outcome,
        }
    }

    pub async fn evict(&self, cache_name: &str, key: serde_json::Value) -> ForwardingOutcome {
        self.forward(&ReplicationEvent::cache_evict(cache_name, key))
            .await
            .outcome
    }

    pub async fn send_event(&self, event: DomainEvent) -> ForwardingOutcome {
        self.forward(&ReplicationEvent::DomainEvent(event))
            .await
            .outcome
    }

    pub async fn index_change(
        &self,
        change_id: &str,
        operation: IndexOperation,
        meta: Option<IndexMeta>,
    ) -> ForwardingOutcome {
        self.index(CHANGE_INDEX, change_id, operation, meta).await
    }

    pub async fn index_project(&self, name: &str, operation: IndexOperation) -> ForwardingOutcome {
        let meta = Some(IndexMeta::now(&self.node_id));
        self.index(PROJECT_INDEX, name, operation, meta).await
    }

    pub async fn index_account(&self, account_id: &str) -> ForwardingOutcome {
        let meta = Some(IndexMeta::now(&self.node_id));
        self.index(ACCOUNT_INDEX, account_id, IndexOperation::Index, meta)
            .await
    }

    pub async fn index_group(&self, group_uuid: &str) -> ForwardingOutcome {
        let meta = Some(IndexMeta::now(&self.node_id));
        self.index(GROUP_INDEX, group_uuid, IndexOperation::Index, meta)
            .await
    }

    pub async fn delete_from_index(
        &self,
        kind: &str,
        id: &str,
        meta: Option<IndexMeta>,
    ) -> ForwardingOutcome {
        self.index(kind, id, IndexOperation::Delete, meta).await
    }

    async fn index(
        &self,
        kind: &str,
        id: &str,
        operation: IndexOperation,
        meta: Option<IndexMeta>,
    ) -> ForwardingOutcome {
        self.forward(&ReplicationEvent::index_mutation(kind, id, operation, meta))
            .await
            .outcome
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Transport that records what it is asked to send.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<(PeerAddress, ReplicationEvent)>>,
        pub reply: Mutex<Option<ForwardingOutcome>>,
    }

    impl RecordingTransport {
        pub fn sent(&self) -> Vec<(PeerAddress, ReplicationEvent)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplicationTransport for RecordingTransport {
        async fn send(&self, peer: &PeerAddress, event: &ReplicationEvent) -> ForwardingOutcome {
            self.sent.lock().unwrap().push((peer.clone(), event.clone()));
            self.reply
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(ForwardingOutcome::Success)
        }
    }
}
