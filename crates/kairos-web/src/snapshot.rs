//! Wire shapes for the REST surface.
//!
//! Most endpoints serialize kairos types directly. The two here exist
//! because the response carries more than one stored value: the latest
//! decision needs a placeholder before the first window closes, and the
//! timeline reports its bounds next to the entries.

use kairos::DecisionRecord;
use kairos::state::{AgentStateStore, AgentStatus};
use serde::Serialize;

/// Shown by `/api/decision` until the first window has been decided.
pub const PENDING_MESSAGE: &str =
    "No decisions yet. The agent is still observing your first window.";

/// Body of `GET /api/decision`, tagged by `status`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LatestDecisionView {
    Pending { message: String },
    Ready(DecisionRecord),
}

impl LatestDecisionView {
    pub fn from_store(store: &AgentStateStore) -> Self {
        match store.latest_decision() {
            Some(record) => Self::Ready(record),
            None => Self::Pending {
                message: PENDING_MESSAGE.to_string(),
            },
        }
    }
}

/// Body of `GET /api/timeline`.
#[derive(Debug, Serialize)]
pub struct TimelineView {
    /// Most recent first.
    pub decisions: Vec<DecisionRecord>,
    pub count: usize,
    pub capacity: usize,
}

impl TimelineView {
    pub fn from_store(store: &AgentStateStore, limit: usize) -> Self {
        let decisions = store.get_timeline(limit);
        Self {
            count: decisions.len(),
            capacity: store.capacity(),
            decisions,
        }
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthView {
    pub status: &'static str,
    pub agent_status: AgentStatus,
}
