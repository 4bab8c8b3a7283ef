//! Last-known agent state and the decision timeline.
//!
//! The agent loop is the only writer; the presentation layer (and anything
//! else holding a clone) reads. State and timeline live behind one lock, so
//! a reader can never see a new state next to a stale timeline or the
//! reverse.
//!
//! ```text
//! Agent loop ──update()──▶ AgentStateStore ◀──get()/get_timeline()── REST API
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Action, DecisionRecord, DecisionSource, Intent};

/// Default number of decisions kept in the timeline.
pub const DEFAULT_TIMELINE_CAPACITY: usize = 50;

/// Focus context shown before the first window closes.
pub const INITIAL_FOCUS_CONTEXT: &str = "Initializing...";

/// Coarse lifecycle of the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Initializing,
    /// Decisions are flowing normally.
    Observing,
    /// The last decision came from the fallback path.
    Degraded,
    Stopped,
}

/// Snapshot of what the agent currently believes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub intent: Intent,
    pub confidence: f64,
    pub focus_context: String,
    pub status: AgentStatus,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            focus_context: INITIAL_FOCUS_CONTEXT.to_string(),
            status: AgentStatus::Initializing,
            last_updated: None,
        }
    }
}

/// Counters for the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    pub started_at: DateTime<Utc>,
    pub windows_processed: u64,
    pub decisions_recorded: u64,
    pub nudges_emitted: u64,
    pub nudges_suppressed: u64,
    pub oracle_calls: u64,
    pub oracle_failures: u64,
    pub oracle_skipped: u64,
    pub windows_skipped: u64,
}

impl AgentStats {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            windows_processed: 0,
            decisions_recorded: 0,
            nudges_emitted: 0,
            nudges_suppressed: 0,
            oracle_calls: 0,
            oracle_failures: 0,
            oracle_skipped: 0,
            windows_skipped: 0,
        }
    }
}

struct Inner {
    state: AgentState,
    timeline: VecDeque<DecisionRecord>,
    stats: AgentStats,
}

/// Shared, single-writer store for [`AgentState`] and the timeline.
///
/// Cloning is cheap and yields another handle to the same store.
#[derive(Clone)]
pub struct AgentStateStore {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
}

impl AgentStateStore {
    /// Create a store keeping at most `capacity` decisions (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(Inner {
                state: AgentState::default(),
                timeline: VecDeque::with_capacity(capacity),
                stats: AgentStats::new(Utc::now()),
            })),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current state. Never blocks on anything but the store lock and has
    /// no side effects.
    pub fn get(&self) -> AgentState {
        self.read(|inner| inner.state.clone())
    }

    /// Replace the state and append to the timeline in one step.
    pub fn update(&self, record: DecisionRecord) {
        self.write(|inner| {
            inner.state = AgentState {
                intent: record.decision.intent,
                confidence: record.decision.confidence,
                focus_context: record.focus_context.clone(),
                status: match record.source {
                    DecisionSource::Fallback => AgentStatus::Degraded,
                    DecisionSource::Oracle | DecisionSource::Local => AgentStatus::Observing,
                },
                last_updated: Some(record.decision.timestamp),
            };

            inner.stats.decisions_recorded += 1;
            if record.decision.action == Action::Nudge {
                inner.stats.nudges_emitted += 1;
            }
            if record.suppressed.is_some() {
                inner.stats.nudges_suppressed += 1;
            }

            if inner.timeline.len() == self.capacity {
                inner.timeline.pop_front();
            }
            inner.timeline.push_back(record);
        });
    }

    /// The most recent recorded decision, if any.
    pub fn latest_decision(&self) -> Option<DecisionRecord> {
        self.read(|inner| inner.timeline.back().cloned())
    }

    /// Up to `limit` decisions, most recent first.
    pub fn get_timeline(&self, limit: usize) -> Vec<DecisionRecord> {
        self.read(|inner| inner.timeline.iter().rev().take(limit).cloned().collect())
    }

    pub fn timeline_len(&self) -> usize {
        self.read(|inner| inner.timeline.len())
    }

    pub fn stats(&self) -> AgentStats {
        self.read(|inner| inner.stats.clone())
    }

    /// Change the lifecycle status without touching the decision.
    pub fn set_status(&self, status: AgentStatus) {
        self.write(|inner| inner.state.status = status);
    }

    /// Adjust counters that are not tied to a recorded decision.
    pub fn record_stats(&self, f: impl FnOnce(&mut AgentStats)) {
        self.write(|inner| f(&mut inner.stats));
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut Inner)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }
}

impl Default for AgentStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_TIMELINE_CAPACITY)
    }
}
