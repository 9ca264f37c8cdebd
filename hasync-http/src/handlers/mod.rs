use hasync::ReplicationManager;
use std::sync::Arc;

pub mod health;
pub mod internal;

pub struct AppState {
    pub manager: Arc<ReplicationManager>,
}

pub use health::{health, mark_ready, mark_unavailable};
pub use internal::{delete_entity, evict_cache, index_entity, post_event, replication_status};
