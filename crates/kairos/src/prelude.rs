//! Convenience re-exports for common `kairos` types.
//!
//! Meant to be glob-imported when wiring up an agent:
//!
//! ```ignore
//! use kairos::prelude::*;
//! ```
//!
//! Oracle internals (retry tuning, request types) and the vocabulary lists
//! are left out; import those from their modules when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    Action, Decision, DecisionRecord, DecisionSource, Intent, KairosError, json_schema_for,
};

// ── Activity ────────────────────────────────────────────────────────
pub use crate::activity::{ActivitySample, ActivitySummary, RawSample, SummaryWindowBuilder};

// ── Classification and decisions ────────────────────────────────────
pub use crate::classifier::{Classification, LocalClassifier};
pub use crate::oracle::{DecisionOracle, OracleFuture, OracleMode, OracleRequest};
pub use crate::policy::{NudgePolicy, PolicyConfig};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    Agent, AgentConfig, AgentEvent, CompositeEventHandler, EventHandler, FnEventHandler,
    LoggingHandler, NoopHandler, SampleSource, spawn_pipeline,
};

// ── State ───────────────────────────────────────────────────────────
pub use crate::state::{AgentState, AgentStateStore, AgentStats, AgentStatus};
