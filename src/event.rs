use serde::{Deserialize, Serialize};
use std::fmt;

pub const CHANGE_INDEX: &str = "change";
pub const PROJECT_INDEX: &str = "project";
pub const ACCOUNT_INDEX: &str = "account";
pub const GROUP_INDEX: &str = "group";

/// What a forwarded index mutation asks the peer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOperation {
    Index,
    Delete,
}

impl fmt::Display for IndexOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexOperation::Index => write!(f, "index"),
            IndexOperation::Delete => write!(f, "delete"),
        }
    }
}

/// Optional context travelling with an index mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Milliseconds since the epoch at which the originating node indexed.
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sha: Option<String>,
}

impl IndexMeta {
    pub fn now(origin_node: impl Into<String>) -> Self {
        IndexMeta {
            created_at_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            origin_node: Some(origin_node.into()),
            target_sha: None,
        }
    }
}

/// A domain event as published on the local event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Project the event belongs to; only project-scoped events are forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl DomainEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        DomainEvent {
            event_type: event_type.into(),
            project: None,
            payload,
        }
    }

    pub fn for_project(
        event_type: impl Into<String>,
        project: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        DomainEvent {
            event_type: event_type.into(),
            project: Some(project.into()),
            payload,
        }
    }

    pub fn is_project_scoped(&self) -> bool {
        self.project.is_some()
    }
}

/// Why an entry left the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalCause {
    /// Invalidated by application code. The only cause that is forwarded.
    Explicit,
    /// Dropped for capacity.
    Evicted,
    /// Aged out.
    Expired,
}

/// Removal notification emitted by the local cache implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRemoval {
    pub cache_name: String,
    pub key: serde_json::Value,
    pub cause: RemovalCause,
}

impl CacheRemoval {
    pub fn explicit(cache_name: impl Into<String>, key: serde_json::Value) -> Self {
        CacheRemoval {
            cache_name: cache_name.into(),
            key,
            cause: RemovalCause::Explicit,
        }
    }
}

/// A local mutation on its way to the peer.
///
/// Only built by a dispatcher (or the [`Forwarder`](crate::forwarder::Forwarder)
/// façade) from a local signal; the wire endpoint is derived from the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplicationEvent {
    CacheEvict {
        cache_name: String,
        key: serde_json::Value,
    },
    DomainEvent(DomainEvent),
    IndexMutation {
        entity_kind: String,
        entity_id: String,
        operation: IndexOperation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<IndexMeta>,
    },
}

impl ReplicationEvent {
    pub fn cache_evict(cache_name: impl Into<String>, key: serde_json::Value) -> Self {
        ReplicationEvent::CacheEvict {
            cache_name: cache_name.into(),
            key,
        }
    }

    pub fn index_mutation(
        entity_kind: impl Into<String>,
        entity_id: impl Into<String>,
        operation: IndexOperation,
        meta: Option<IndexMeta>,
    ) -> Self {
        ReplicationEvent::IndexMutation {
            entity_kind: entity_kind.into(),
            entity_id: entity_id.into(),
            operation,
            meta,
        }
    }
}

impl fmt::Display for ReplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationEvent::CacheEvict { cache_name, key } => {
                write!(f, "evict key '{}' from cache '{}'", key, cache_name)
            }
            ReplicationEvent::DomainEvent(event) => write!(f, "event '{}'", event.event_type),
            ReplicationEvent::IndexMutation {
                entity_kind,
                entity_id,
                operation,
                ..
            } => write!(f, "{} {} '{}'", operation, entity_kind, entity_id),
        }
    }
}
