//! Axum server setup and router construction.

use std::net::SocketAddr;

use axum::Router;
use axum::http::Method;
use axum::routing::get;
use kairos::state::AgentStateStore;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::api::{self, AppState};

/// Build the REST router.
///
/// All routes are `GET`. CORS allows any origin so a dashboard served from
/// elsewhere can poll the agent.
pub fn build_router(store: AgentStateStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/api/state", get(api::get_state))
        .route("/api/decision", get(api::get_decision))
        .route("/api/timeline", get(api::get_timeline))
        .route("/api/stats", get(api::get_stats))
        .route("/api/health", get(api::get_health))
        .with_state(AppState { store })
        .layer(cors)
}

/// Bind `bind_addr`, serve `router` on a background task, and return the
/// bound address. The server stops when `cancel` fires.
pub async fn start_server(
    router: Router,
    bind_addr: SocketAddr,
    cancel: CancellationToken,
) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("Web server failed: {e}");
        }
        info!("Web server on {addr} stopped");
    });

    Ok(addr)
}
