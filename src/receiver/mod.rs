//! Inbound side: applying operations forwarded by the peer.
//!
//! Every apply runs inside [`ForwardingContext::scope`] so the local side
//! effects it triggers are not forwarded back. Index applies additionally hold
//! a stripe lock for `(kind, id)` for their whole duration.

pub mod cache;
pub mod event;

pub use cache::{CacheEvictionReceiver, CacheEvictor};
pub use event::{EventReceiver, EventSink};

use crate::context::ForwardingContext;
use crate::error::{HaError, Result};
use crate::event::{IndexMeta, IndexOperation};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Fixed array of mutexes addressed by `hash(kind, id) mod N`.
///
/// Distinct ids may share a stripe and then serialize with each other.
pub struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripedLocks {
    pub fn new(count: usize) -> Self {
        StripedLocks {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    pub fn stripe_for(&self, kind: &str, id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        id.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    /// Waits without timeout.
    pub async fn lock(&self, kind: &str, id: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_for(kind, id)].lock().await
    }
}

/// Local index operations for one entity kind.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn index(&self, id: &str, meta: Option<&IndexMeta>) -> Result<()>;

    /// Kinds that cannot delete keep the default; the receiver rejects the
    /// request before locking.
    fn supports_delete(&self) -> bool {
        false
    }

    /// The receiver reports the error under its own kind.
    async fn delete(&self, _id: &str, _meta: Option<&IndexMeta>) -> Result<()> {
        Err(HaError::UnsupportedOperation {
            kind: String::new(),
            operation: IndexOperation::Delete.to_string(),
        })
    }
}

/// Applies forwarded index mutations of one entity kind.
pub struct IndexReceiver {
    kind: String,
    indexer: Arc<dyn Indexer>,
    locks: StripedLocks,
}

impl IndexReceiver {
    pub fn new(
        kind: impl Into<String>,
        indexer: Arc<dyn Indexer>,
        num_striped_locks: usize,
    ) -> Self {
        IndexReceiver {
            kind: kind.into(),
            indexer,
            locks: StripedLocks::new(num_striped_locks),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn supports_delete(&self) -> bool {
        self.indexer.supports_delete()
    }

    pub fn locks(&self) -> &StripedLocks {
        &self.locks
    }

    /// Apply one forwarded mutation. Errors from the indexer come back as
    /// [`HaError::LocalApply`] after the lock and the context are released.
    pub async fn apply(
        &self,
        id: &str,
        operation: IndexOperation,
        meta: Option<&IndexMeta>,
    ) -> Result<()> {
        if operation == IndexOperation::Delete && !self.indexer.supports_delete() {
            return Err(HaError::UnsupportedOperation {
                kind: self.kind.clone(),
                operation: operation.to_string(),
            });
        }

        let _guard = self.locks.lock(&self.kind, id).await;
        let result = ForwardingContext::scope(async {
            match operation {
                IndexOperation::Index => self.indexer.index(id, meta).await,
                IndexOperation::Delete => self.indexer.delete(id, meta).await,
            }
        })
        .await;

        match result {
            Ok(()) => {
                tracing::debug!(
                    "[REPL index] applied forwarded {} {} '{}'",
                    operation,
                    self.kind,
                    id
                );
                Ok(())
            }
            Err(HaError::UnsupportedOperation { operation, .. }) => {
                Err(HaError::UnsupportedOperation {
                    kind: self.kind.clone(),
                    operation,
                })
            }
            Err(e @ HaError::LocalApply { .. }) => Err(e),
            Err(e) => Err(HaError::local_apply(&self.kind, id, e)),
        }
    }
}
