use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use hasync::ReplicationManager;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::require_basic_auth;
use crate::handlers::{
    delete_entity, evict_cache, health, index_entity, mark_ready, mark_unavailable, post_event,
    replication_status, AppState,
};

/// Install the global subscriber: `RUST_LOG` filter (default `info`), fmt
/// output. A subscriber installed earlier is left in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Inbound surface: forwarded operations, health, status.
pub fn router(manager: Arc<ReplicationManager>) -> Router {
    let state = Arc::new(AppState { manager });

    let replication = Router::new()
        .route(
            "/internal/replication/cache/:cache_name",
            post(evict_cache),
        )
        .route(
            "/internal/replication/event/:event_type",
            post(post_event),
        )
        .route(
            "/internal/replication/index/:kind/:id",
            post(index_entity).delete(delete_entity),
        )
        .route("/internal/status", get(replication_status));

    let health_route = Router::new().route(
        "/health",
        get(health).put(mark_ready).delete(mark_unavailable),
    );

    Router::new()
        .merge(health_route)
        .merge(replication)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_basic_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router(manager)` on `config.bind_addr` until Ctrl-C.
pub async fn serve(manager: Arc<ReplicationManager>) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = manager.config().bind_addr.clone();
    let node_id = manager.node_id().to_string();
    let app = router(manager);

    tracing::info!("[REPL {}] listening on {}", node_id, bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    tracing::info!("[REPL {}] server stopped", node_id);
    Ok(())
}
