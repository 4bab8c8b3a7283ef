//! REST API endpoint handlers.
//!
//! Every route is a read of the shared [`AgentStateStore`]; nothing here
//! mutates agent state, so clients can poll as often as they like.

use axum::Json;
use axum::extract::{Query, State};
use kairos::state::{AgentState, AgentStateStore, AgentStats};
use serde::Deserialize;

use crate::snapshot::{HealthView, LatestDecisionView, TimelineView};

/// Timeline entries returned when the client does not ask for a count.
pub const DEFAULT_TIMELINE_LIMIT: usize = 10;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: AgentStateStore,
}

/// GET /api/state: Current intent, confidence, focus context, and status.
pub async fn get_state(State(app): State<AppState>) -> Json<AgentState> {
    Json(app.store.get())
}

/// GET /api/decision: The latest decision, or a pending placeholder.
pub async fn get_decision(State(app): State<AppState>) -> Json<LatestDecisionView> {
    Json(LatestDecisionView::from_store(&app.store))
}

/// Query string for GET /api/timeline.
#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    pub limit: Option<usize>,
}

/// GET /api/timeline: Recent decisions, newest first.
pub async fn get_timeline(
    State(app): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Json<TimelineView> {
    let limit = effective_limit(query.limit, app.store.capacity());
    Json(TimelineView::from_store(&app.store, limit))
}

/// GET /api/stats: Pipeline counters since startup.
pub async fn get_stats(State(app): State<AppState>) -> Json<AgentStats> {
    Json(app.store.stats())
}

/// GET /api/health: Liveness plus the agent's lifecycle status.
pub async fn get_health(State(app): State<AppState>) -> Json<HealthView> {
    Json(HealthView {
        status: "ok",
        agent_status: app.store.get().status,
    })
}

fn effective_limit(requested: Option<usize>, capacity: usize) -> usize {
    requested.unwrap_or(DEFAULT_TIMELINE_LIMIT).min(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_query_deserializes() {
        let q: TimelineQuery = serde_json::from_str(r#"{"limit":3}"#).unwrap();
        assert_eq!(q.limit, Some(3));
        let q: TimelineQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, None);
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(effective_limit(None, 50), 10);
        assert_eq!(effective_limit(Some(3), 50), 3);
        assert_eq!(effective_limit(Some(500), 50), 50);
        assert_eq!(effective_limit(None, 4), 4);
        assert_eq!(effective_limit(Some(0), 50), 0);
    }
}
