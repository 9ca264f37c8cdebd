//! Two nodes forwarding to each other over real HTTP.

use async_trait::async_trait;
use hasync::event::CHANGE_INDEX;
use hasync::receiver::{CacheEvictor, Indexer};
use hasync::{
    CacheRemoval, Collaborators, DispatchOutcome, IndexMeta, IndexOperation, NodeConfig,
    ReplicationManager, Result,
};
use serde_json::json;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::net::TcpListener;

/// Local caches and index of one node. Every change it applies is announced
/// back to the manager, the way real caches and indexers notify listeners.
#[derive(Default)]
struct LocalState {
    manager: Mutex<Weak<ReplicationManager>>,
    evicted: Mutex<Vec<String>>,
    indexed: Mutex<Vec<String>>,
}

impl LocalState {
    fn manager(&self) -> Option<Arc<ReplicationManager>> {
        self.manager.lock().unwrap().upgrade()
    }
}

struct Caches(Arc<LocalState>);

#[async_trait]
impl CacheEvictor for Caches {
    async fn invalidate(&self, cache_name: &str, key: &serde_json::Value) -> Result<()> {
        self.0.evicted.lock().unwrap().push(format!("{}:{}", cache_name, key));
        if let Some(manager) = self.0.manager() {
            manager.on_cache_removal(&CacheRemoval::explicit(cache_name, key.clone()));
        }
        Ok(())
    }
}

struct Changes(Arc<LocalState>);

#[async_trait]
impl Indexer for Changes {
    async fn index(&self, id: &str, _meta: Option<&IndexMeta>) -> Result<()> {
        self.0.indexed.lock().unwrap().push(id.to_string());
        if let Some(manager) = self.0.manager() {
            manager.on_index(CHANGE_INDEX, id, IndexOperation::Index, None);
        }
        Ok(())
    }
}

struct Node {
    manager: Arc<ReplicationManager>,
    state: Arc<LocalState>,
}

fn start_node(
    node_id: &str,
    listener: TcpListener,
    peer_url: String,
    credentials: (&str, &str),
) -> Node {
    let mut config = NodeConfig::standalone(node_id);
    config.peer_info.static_urls = vec![peer_url];
    config.http.user = credentials.0.to_string();
    config.http.password = credentials.1.to_string();
    config.http.max_tries = 3;
    config.http.retry_interval_ms = 50;
    config.http.socket_timeout_ms = 2000;

    let state = Arc::new(LocalState::default());
    let collaborators = Collaborators::new()
        .with_cache_evictor(Arc::new(Caches(state.clone())))
        .with_indexer(CHANGE_INDEX, Arc::new(Changes(state.clone())));
    let manager = ReplicationManager::new(config, collaborators).unwrap();
    *state.manager.lock().unwrap() = Arc::downgrade(&manager);

    let app = hasync_http::router(Arc::clone(&manager));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Node { manager, state }
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

async fn pair() -> (Node, Node) {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url_a = format!("http://{}/", listener_a.local_addr().unwrap());
    let url_b = format!("http://{}/", listener_b.local_addr().unwrap());

    let a = start_node("node-a", listener_a, url_b, ("ha", "secret"));
    let b = start_node("node-b", listener_b, url_a, ("ha", "secret"));
    (a, b)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_eviction_reaches_peer_once() {
    let (a, b) = pair().await;

    let outcome = a
        .manager
        .on_cache_removal(&CacheRemoval::explicit("accounts", json!(1000001)));
    assert_eq!(outcome, DispatchOutcome::Queued);

    assert!(
        wait_until(|| !b.state.evicted.lock().unwrap().is_empty()).await,
        "eviction never reached node-b"
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(
        b.state.evicted.lock().unwrap().clone(),
        vec!["accounts:1000001".to_string()]
    );
    // node-b's own invalidation was not forwarded back.
    assert!(a.state.evicted.lock().unwrap().is_empty());
    assert_eq!(a.manager.status().queues["cache"].forwarded, 1);
    assert_eq!(b.manager.status().queues["cache"].queued, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_index_update_does_not_ping_pong() {
    let (a, b) = pair().await;

    a.manager
        .on_index(CHANGE_INDEX, "123", IndexOperation::Index, None);

    assert!(
        wait_until(|| !b.state.indexed.lock().unwrap().is_empty()).await,
        "index update never reached node-b"
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(b.state.indexed.lock().unwrap().clone(), vec!["123".to_string()]);
    assert!(a.state.indexed.lock().unwrap().is_empty());
    assert_eq!(b.manager.status().queues["index"].queued, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_credentials_are_application_errors() {
    let listener_a = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener_b = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url_a = format!("http://{}", listener_a.local_addr().unwrap());
    let url_b = format!("http://{}", listener_b.local_addr().unwrap());

    let a = start_node("node-a", listener_a, url_b, ("ha", "wrong"));
    let b = start_node("node-b", listener_b, url_a, ("ha", "secret"));

    a.manager
        .on_cache_removal(&CacheRemoval::explicit("accounts", json!(7)));

    assert!(
        wait_until(|| a.manager.status().queues["cache"].failed == 1).await,
        "rejected forward was not counted"
    );
    assert!(b.state.evicted.lock().unwrap().is_empty());
}
