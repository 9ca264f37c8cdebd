use crate::context::ForwardingContext;
use crate::error::{HaError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Local cache invalidation.
#[async_trait]
pub trait CacheEvictor: Send + Sync {
    async fn invalidate(&self, cache_name: &str, key: &serde_json::Value) -> Result<()>;
}

/// Applies cache evictions forwarded by the peer.
pub struct CacheEvictionReceiver {
    evictor: Arc<dyn CacheEvictor>,
}

impl CacheEvictionReceiver {
    pub fn new(evictor: Arc<dyn CacheEvictor>) -> Self {
        CacheEvictionReceiver { evictor }
    }

    pub async fn apply(&self, cache_name: &str, key: &serde_json::Value) -> Result<()> {
        ForwardingContext::scope(self.evictor.invalidate(cache_name, key))
            .await
            .map_err(|e| match e {
                e @ HaError::LocalApply { .. } => e,
                other => HaError::local_apply("cache", cache_name, other),
            })?;
        tracing::debug!("[REPL cache] evicted {} from {}", key, cache_name);
        Ok(())
    }
}
