use crate::config::{NodeConfig, PeerInfoStrategy};
use crate::dispatch::{
    CacheEvictionDispatcher, DispatchOutcome, EventDispatcher, IndexEventDispatcher, QueueStats,
};
use crate::error::{HaError, Result};
use crate::event::{CacheRemoval, DomainEvent, IndexMeta, IndexOperation};
use crate::forwarder::Forwarder;
use crate::health::HealthSignal;
use crate::peers::{resolver_from_config, DynamicPeerResolver, PeerResolver};
use crate::receiver::{
    CacheEvictionReceiver, CacheEvictor, EventReceiver, EventSink, IndexReceiver, Indexer,
};
use crate::transport::{HttpTransport, ReplicationTransport};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Local components the forwarding core plugs into.
#[derive(Default)]
pub struct Collaborators {
    indexers: Vec<(String, Arc<dyn Indexer>)>,
    cache_evictor: Option<Arc<dyn CacheEvictor>>,
    event_sink: Option<Arc<dyn EventSink>>,
    transport: Option<Arc<dyn ReplicationTransport>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indexer(mut self, kind: impl Into<String>, indexer: Arc<dyn Indexer>) -> Self {
        self.indexers.push((kind.into(), indexer));
        self
    }

    pub fn with_cache_evictor(mut self, evictor: Arc<dyn CacheEvictor>) -> Self {
        self.cache_evictor = Some(evictor);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Replace the HTTP transport built from `config.http`.
    pub fn with_transport(mut self, transport: Arc<dyn ReplicationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplicationStatus {
    pub node_id: String,
    pub strategy: PeerInfoStrategy,
    pub peer: Option<String>,
    pub healthy: bool,
    pub index_kinds: Vec<String>,
    pub queues: BTreeMap<&'static str, QueueStats>,
}

/// Owns both directions of forwarding for this node.
pub struct ReplicationManager {
    config: NodeConfig,
    resolver: Arc<dyn PeerResolver>,
    membership: Option<Arc<DynamicPeerResolver>>,
    forwarder: Arc<Forwarder>,
    cache_dispatcher: Option<CacheEvictionDispatcher>,
    event_dispatcher: Option<EventDispatcher>,
    index_dispatcher: Option<IndexEventDispatcher>,
    index_receivers: DashMap<String, Arc<IndexReceiver>>,
    cache_receiver: Option<CacheEvictionReceiver>,
    event_receiver: Option<EventReceiver>,
    health: HealthSignal,
}

impl ReplicationManager {
    /// Wire resolver, transport, dispatchers and receivers. Dispatch workers
    /// are spawned here; outside a Tokio runtime this fails with
    /// [`HaError::Config`].
    pub fn new(config: NodeConfig, collaborators: Collaborators) -> Result<Arc<Self>> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(HaError::Config(
                "ReplicationManager must be created inside a Tokio runtime".into(),
            ));
        }
        let config = config.validate()?;
        let (resolver, membership) = resolver_from_config(&config)?;
        let transport = match collaborators.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config.http)?),
        };
        let forwarder = Arc::new(Forwarder::new(
            config.node_id.clone(),
            Arc::clone(&resolver),
            transport,
        ));

        let cache_dispatcher = if config.cache.synchronize {
            Some(CacheEvictionDispatcher::new(
                &config.cache,
                Arc::clone(&forwarder),
            )?)
        } else {
            None
        };
        let event_dispatcher = if config.event.synchronize {
            Some(EventDispatcher::new(&config.event, Arc::clone(&forwarder))?)
        } else {
            None
        };
        let index_dispatcher = if config.index.synchronize {
            Some(IndexEventDispatcher::new(
                &config.index,
                Arc::clone(&forwarder),
            ))
        } else {
            None
        };

        let index_receivers = DashMap::new();
        for (kind, indexer) in collaborators.indexers {
            let receiver = IndexReceiver::new(kind.clone(), indexer, config.index.num_striped_locks);
            index_receivers.insert(kind, Arc::new(receiver));
        }

        let health = HealthSignal::new(&config.health_check);

        tracing::info!(
            "[REPL {}] forwarding core ready (strategy={:?}, peer={}, cache={}, event={}, index={})",
            config.node_id,
            resolver.strategy(),
            resolver
                .resolve()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            config.cache.synchronize,
            config.event.synchronize,
            config.index.synchronize
        );

        Ok(Arc::new(ReplicationManager {
            cache_receiver: collaborators.cache_evictor.map(CacheEvictionReceiver::new),
            event_receiver: collaborators.event_sink.map(EventReceiver::new),
            config,
            resolver,
            membership,
            forwarder,
            cache_dispatcher,
            event_dispatcher,
            index_dispatcher,
            index_receivers,
            health,
        }))
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<dyn PeerResolver> {
        &self.resolver
    }

    /// The dynamic resolver to feed membership views into, if configured.
    pub fn membership(&self) -> Option<&Arc<DynamicPeerResolver>> {
        self.membership.as_ref()
    }

    pub fn forwarder(&self) -> &Arc<Forwarder> {
        &self.forwarder
    }

    pub fn health(&self) -> &HealthSignal {
        &self.health
    }

    /// Register (or replace) the local indexer for `kind`.
    pub fn register_indexer(&self, kind: &str, indexer: Arc<dyn Indexer>) -> Arc<IndexReceiver> {
        let receiver = Arc::new(IndexReceiver::new(
            kind,
            indexer,
            self.config.index.num_striped_locks,
        ));
        self.index_receivers
            .insert(kind.to_string(), Arc::clone(&receiver));
        receiver
    }

    pub fn index_receiver(&self, kind: &str) -> Option<Arc<IndexReceiver>> {
        self.index_receivers.get(kind).map(|r| Arc::clone(r.value()))
    }

    pub fn cache_receiver(&self) -> Option<&CacheEvictionReceiver> {
        self.cache_receiver.as_ref()
    }

    pub fn event_receiver(&self) -> Option<&EventReceiver> {
        self.event_receiver.as_ref()
    }

    /// Entry point for the local cache's removal notifications.
    pub fn on_cache_removal(&self, removal: &CacheRemoval) -> DispatchOutcome {
        match &self.cache_dispatcher {
            Some(d) => d.on_removal(removal),
            None => DispatchOutcome::Disabled,
        }
    }

    /// Entry point for the local event bus.
    pub fn on_event(&self, event: &DomainEvent) -> DispatchOutcome {
        match &self.event_dispatcher {
            Some(d) => d.on_event(event),
            None => DispatchOutcome::Disabled,
        }
    }

    /// Entry point for local index notifications.
    pub fn on_index(
        &self,
        kind: &str,
        id: &str,
        operation: IndexOperation,
        meta: Option<IndexMeta>,
    ) -> DispatchOutcome {
        match &self.index_dispatcher {
            Some(d) => d.on_index(kind, id, operation, meta),
            None => DispatchOutcome::Disabled,
        }
    }

    pub fn status(&self) -> ReplicationStatus {
        let mut index_kinds: Vec<String> =
            self.index_receivers.iter().map(|e| e.key().clone()).collect();
        index_kinds.sort();

        let mut queues = BTreeMap::new();
        if let Some(d) = &self.cache_dispatcher {
            queues.insert("cache", d.stats());
        }
        if let Some(d) = &self.event_dispatcher {
            queues.insert("event", d.stats());
        }
        if let Some(d) = &self.index_dispatcher {
            queues.insert("index", d.stats());
        }

        ReplicationStatus {
            node_id: self.config.node_id.clone(),
            strategy: self.resolver.strategy(),
            peer: self.resolver.resolve().map(|p| p.url().to_string()),
            healthy: self.health.is_healthy(),
            index_kinds,
            queues,
        }
    }
}
