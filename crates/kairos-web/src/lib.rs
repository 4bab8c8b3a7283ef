//! Read-only REST surface for a running kairos agent.
//!
//! `kairos-web` serves the agent's [`AgentStateStore`] over HTTP so a
//! dashboard (or `curl`) can see what the agent currently believes, its
//! latest decision, and recent history. Clients poll; there is no push
//! channel and no write endpoint.
//!
//! # Quick start
//!
//! ```ignore
//! use kairos::state::AgentStateStore;
//! use kairos_web::{WebConfig, spawn_web};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = AgentStateStore::default();
//! let addr = spawn_web(store.clone(), WebConfig::default(), CancellationToken::new()).await?;
//! println!("API: http://{addr}/api/state");
//! ```
//!
//! # Routes
//!
//! | Route | Body |
//! |-------|------|
//! | `GET /api/state` | [`AgentState`](kairos::state::AgentState) |
//! | `GET /api/decision` | [`LatestDecisionView`]: `ready` plus the record, or `pending` |
//! | `GET /api/timeline?limit=N` | [`TimelineView`], newest first, default 10, capped at capacity |
//! | `GET /api/stats` | [`AgentStats`](kairos::state::AgentStats) |
//! | `GET /api/health` | [`HealthView`](snapshot::HealthView) |

mod api;
mod server;
pub mod snapshot;

pub use api::DEFAULT_TIMELINE_LIMIT;
pub use server::build_router;
pub use snapshot::{LatestDecisionView, TimelineView};

use std::net::SocketAddr;

use kairos::state::AgentStateStore;
use tokio_util::sync::CancellationToken;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until `cancel` fires or the runtime shuts down.
pub async fn spawn_web(
    store: AgentStateStore,
    config: WebConfig,
    cancel: CancellationToken,
) -> Result<SocketAddr, String> {
    let router = server::build_router(store);
    server::start_server(router, config.bind_addr, cancel)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", config.bind_addr))
}
