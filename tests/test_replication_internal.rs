use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use hasync::event::{CHANGE_INDEX, PROJECT_INDEX};
use hasync::receiver::{CacheEvictor, EventSink, Indexer};
use hasync::{
    Collaborators, DomainEvent, ForwardingContext, HaError, IndexMeta, NodeConfig,
    ReplicationManager, Result,
};
use http_body_util::BodyExt;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    fn record(&self, call: String) {
        assert!(
            ForwardingContext::is_forwarded(),
            "applied outside forwarding context"
        );
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct ChangeIndexer(Arc<Recorder>);

#[async_trait]
impl Indexer for ChangeIndexer {
    async fn index(&self, id: &str, meta: Option<&IndexMeta>) -> Result<()> {
        if id == "broken" {
            return Err(HaError::Io("index is read-only".to_string()));
        }
        self.0.record(format!(
            "index {} {}",
            id,
            meta.and_then(|m| m.origin_node.clone()).unwrap_or_default()
        ));
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        true
    }

    async fn delete(&self, id: &str, _meta: Option<&IndexMeta>) -> Result<()> {
        self.0.record(format!("delete {}", id));
        Ok(())
    }
}

struct ProjectIndexer(Arc<Recorder>);

#[async_trait]
impl Indexer for ProjectIndexer {
    async fn index(&self, id: &str, _meta: Option<&IndexMeta>) -> Result<()> {
        self.0.record(format!("project {}", id));
        Ok(())
    }
}

struct Evictor(Arc<Recorder>);

#[async_trait]
impl CacheEvictor for Evictor {
    async fn invalidate(&self, cache_name: &str, key: &serde_json::Value) -> Result<()> {
        self.0.record(format!("evict {} {}", cache_name, key));
        Ok(())
    }
}

struct Bus(Arc<Recorder>);

#[async_trait]
impl EventSink for Bus {
    async fn post(&self, event: DomainEvent) -> Result<()> {
        self.0.record(format!("event {}", event.event_type));
        Ok(())
    }
}

fn node(config: NodeConfig, full: bool) -> (Router, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let mut collaborators = Collaborators::new()
        .with_indexer(CHANGE_INDEX, Arc::new(ChangeIndexer(recorder.clone())))
        .with_indexer(PROJECT_INDEX, Arc::new(ProjectIndexer(recorder.clone())));
    if full {
        collaborators = collaborators
            .with_cache_evictor(Arc::new(Evictor(recorder.clone())))
            .with_event_sink(Arc::new(Bus(recorder.clone())));
    }
    let manager = ReplicationManager::new(config, collaborators).unwrap();
    (hasync_http::router(manager), recorder)
}

fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn test_forwarded_cache_eviction() {
    let (app, recorder) = node(NodeConfig::standalone("node-b"), true);

    let (status, body) = send(
        &app,
        request("POST", "/internal/replication/cache/accounts", "1000001"),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT, "body: {}", body);
    assert_eq!(recorder.calls(), vec!["evict accounts 1000001"]);
}

#[tokio::test]
async fn test_forwarded_event() {
    let (app, recorder) = node(NodeConfig::standalone("node-b"), true);
    let event = serde_json::to_string(&DomainEvent::for_project("ref-updated", "demo", json!({})))
        .unwrap();

    let (status, _) = send(
        &app,
        request("POST", "/internal/replication/event/ref-updated", &event),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(recorder.calls(), vec!["event ref-updated"]);

    let (status, body) = send(
        &app,
        request("POST", "/internal/replication/event/comment-added", &event),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("does not match"));
}

#[tokio::test]
async fn test_forwarded_index_and_delete() {
    let (app, recorder) = node(NodeConfig::standalone("node-b"), true);

    let meta = r#"{"created_at_ms": 1, "origin_node": "node-a"}"#;
    let (status, _) = send(
        &app,
        request("POST", "/internal/replication/index/change/test%2Fproject~123", meta),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        request("DELETE", "/internal/replication/index/change/42", ""),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(
        recorder.calls(),
        vec!["index test/project~123 node-a", "delete 42"]
    );
}

#[tokio::test]
async fn test_error_statuses_carry_plain_text() {
    let (app, recorder) = node(NodeConfig::standalone("node-b"), false);

    let (status, body) = send(
        &app,
        request("DELETE", "/internal/replication/index/project/demo", ""),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, "Operation delete not supported on project index");

    let (status, body) = send(
        &app,
        request("POST", "/internal/replication/index/change/broken", ""),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("index is read-only"), "body: {}", body);

    let (status, _) = send(
        &app,
        request("POST", "/internal/replication/index/widget/1", ""),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        request("POST", "/internal/replication/index/change/1", "{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No evictor installed on this node.
    let (status, _) = send(
        &app,
        request("POST", "/internal/replication/cache/accounts", "1"),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_basic_auth_required_when_configured() {
    let mut config = NodeConfig::standalone("node-b");
    config.http.user = "ha".to_string();
    config.http.password = "secret".to_string();
    let (app, recorder) = node(config, true);

    let (status, _) = send(
        &app,
        request("POST", "/internal/replication/cache/accounts", "1"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut wrong = request("POST", "/internal/replication/cache/accounts", "1");
    wrong
        .headers_mut()
        .insert(header::AUTHORIZATION, "Basic aGE6d3Jvbmc=".parse().unwrap());
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut right = request("POST", "/internal/replication/cache/accounts", "1");
    right
        .headers_mut()
        .insert(header::AUTHORIZATION, "Basic aGE6c2VjcmV0".parse().unwrap());
    let (status, _) = send(&app, right).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(recorder.calls().len(), 1);

    // Probes stay open.
    let (status, _) = send(&app, request("GET", "/health", "")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", "/internal/status", "")).await;
    assert_eq!(status, StatusCode::OK);

    // Changing health does not.
    let (status, _) = send(&app, request("DELETE", "/health", "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_toggle() {
    let (app, _) = node(NodeConfig::standalone("node-b"), true);

    let (status, _) = send(&app, request("GET", "/health", "")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request("DELETE", "/health", "")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", "/health", "")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&app, request("PUT", "/health", "")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", "/health", "")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_health_check_disabled_stays_healthy() {
    let mut config = NodeConfig::standalone("node-b");
    config.health_check.enable = false;
    let (app, _) = node(config, true);

    send(&app, request("DELETE", "/health", "")).await;
    let (status, _) = send(&app, request("GET", "/health", "")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_internal_status() {
    let mut config = NodeConfig::standalone("node-b");
    config.peer_info.static_urls = vec!["http://node-a:7800/".to_string()];
    let (app, _) = node(config, true);

    let (status, body) = send(&app, request("GET", "/internal/status", "")).await;
    assert_eq!(status, StatusCode::OK);
    let status: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(status["node_id"], "node-b");
    assert_eq!(status["strategy"], "static");
    assert_eq!(status["peer"], "http://node-a:7800");
    assert_eq!(status["healthy"], true);
    assert_eq!(status["index_kinds"], json!(["change", "project"]));
    assert_eq!(status["queues"]["cache"]["dropped"], 0);
}
