//! Gateway server: router assembly, startup and graceful shutdown

use crate::api;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use memgraph_core::GatewayConfig;
use memgraph_mcp::{ConnectionManager, MemoryStore, ToolInvoker};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub manager: ConnectionManager,
    pub store: MemoryStore<ToolInvoker>,
}

impl AppState {
    pub fn new(manager: ConnectionManager) -> Self {
        let store = MemoryStore::new(ToolInvoker::new(manager.clone()));
        Self { manager, store }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let memory = Router::new()
        .route("/graph", get(api::read_graph))
        .route("/nodes", post(api::open_nodes))
        .route("/search", get(api::search_nodes))
        .route("/entities", post(api::create_entities))
        .route("/entities/delete", post(api::delete_entities))
        .route("/entities/rename", post(api::rename_entity))
        .route("/relations", post(api::create_relations))
        .route("/relations/delete", post(api::delete_relations))
        .route("/observations/add", post(api::add_observations))
        .route("/observations/delete", post(api::delete_observations))
        .route("/observations/update", post(api::update_observation))
        .route("/status", get(api::status));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/memory", memory)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "connected": state.manager.is_connected(),
    }))
}

/// Serve until ctrl-c, then shut the store connection down.
pub async fn start_gateway(config: GatewayConfig, manager: ConnectionManager) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(manager.clone()));
    let app = router(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port).parse()?;

    match manager.config() {
        Ok(mcp) => info!(command = %mcp.command, args = ?mcp.args, cwd = ?mcp.cwd, "store process"),
        Err(e) => tracing::warn!("store configuration is invalid: {}", e),
    }
    info!("Memgraph Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Memory API:   http://{}/api/memory", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down store connection");
    manager.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
