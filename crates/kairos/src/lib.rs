//! Intent-aware focus agent built around a small, auditable decision pipeline.
//!
//! `kairos` watches a stream of foreground-window samples, folds them into
//! fixed time windows, classifies each window against the user's stated
//! goals, and decides whether a gentle nudge is warranted. It only ever
//! recommends: nothing here blocks, closes, or restricts anything.
//!
//! # Pipeline
//!
//! ```text
//! samples ──▶ SummaryWindowBuilder ──ActivitySummary──▶ LocalClassifier ──┐
//!                                                  └──▶ DecisionOracle ───┤
//!                                                                         ▼
//!             AgentStateStore ◀── DecisionRecord ◀── NudgePolicy ◀── Decision
//! ```
//!
//! # Getting started
//!
//! ```ignore
//! use kairos::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let config = AgentConfig::default().with_goals(["coding", "writing"]);
//!     let store = AgentStateStore::new(config.timeline_capacity);
//!     let agent = Agent::new(config, store.clone())
//!         .map_err(|e| e.to_string())?
//!         .with_event_handler(LoggingHandler);
//!
//!     // Feed samples from any source into the builder handle.
//!     let builder = agent.builder();
//!     builder.ingest(ActivitySample::new("Visual Studio Code", "main.rs", chrono::Utc::now()));
//!
//!     agent.run(CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`activity`] | Samples, [`SummaryWindowBuilder`](activity::SummaryWindowBuilder), title sanitization, sample sources |
//! | [`classifier`] | [`LocalClassifier`](classifier::LocalClassifier) and its [`Vocabulary`](classifier::Vocabulary) |
//! | [`oracle`] | [`DecisionOracle`](oracle::DecisionOracle) trait, HTTP and deterministic oracles, retry, fallback |
//! | [`policy`] | [`NudgePolicy`](policy::NudgePolicy): confidence gate, cooldown, streak |
//! | [`state`] | [`AgentStateStore`](state::AgentStateStore): last known state and the decision timeline |
//! | [`agent`] | The agent loop, [`AgentConfig`](agent::config::AgentConfig), and events |
//! | [`cli`] | Shared clap flags and tracing setup for the binaries |

pub mod activity;
pub mod agent;
pub mod classifier;
pub mod cli;
pub mod error;
pub mod oracle;
pub mod policy;
pub mod prelude;
pub mod state;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::KairosError;

// Re-export schemars for downstream crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` for a type implementing
/// `schemars::JsonSchema`. Used to validate oracle payloads before they
/// are trusted.
///
/// ```
/// use kairos::json_schema_for;
/// use schemars::JsonSchema;
///
/// #[derive(JsonSchema)]
/// #[allow(dead_code)]
/// struct Probe {
///     status: String,
/// }
///
/// let schema = json_schema_for::<Probe>();
/// assert_eq!(schema["type"], "object");
/// ```
pub fn json_schema_for<T: schemars::JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Decisions ──────────────────────────────────────────────────────

/// The inferred work intent for one window.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Productive,
    Neutral,
    Unproductive,
    #[default]
    Unknown,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Productive => write!(f, "productive"),
            Self::Neutral => write!(f, "neutral"),
            Self::Unproductive => write!(f, "unproductive"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// What the agent does with a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Keep watching. Older backends send this as `"none"`.
    #[default]
    #[serde(alias = "none")]
    Observe,
    /// Surface a nudge message to the user.
    Nudge,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observe => write!(f, "observe"),
            Self::Nudge => write!(f, "nudge"),
        }
    }
}

/// A structured decision about one activity window.
///
/// `nudge_message` is present exactly when `action` is [`Action::Nudge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub intent: Intent,
    /// Confidence in `intent`, within `[0, 1]`.
    pub confidence: f64,
    pub action: Action,
    /// Human-readable justification. Never empty.
    pub reasoning: String,
    #[serde(default)]
    pub nudge_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// An observe-only decision.
    pub fn observe(
        intent: Intent,
        confidence: f64,
        reasoning: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            intent,
            confidence,
            action: Action::Observe,
            reasoning: reasoning.into(),
            nudge_message: None,
            timestamp,
        }
    }

    /// A nudge decision carrying `message`.
    pub fn nudge(
        intent: Intent,
        confidence: f64,
        reasoning: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            intent,
            confidence,
            action: Action::Nudge,
            reasoning: reasoning.into(),
            nudge_message: Some(message.into()),
            timestamp,
        }
    }

    pub fn is_nudge(&self) -> bool {
        self.action == Action::Nudge
    }
}

/// Which path produced a recorded decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// The configured oracle answered.
    Oracle,
    /// Local heuristics were confident enough that the oracle was skipped.
    Local,
    /// The oracle failed and local heuristics stood in.
    Fallback,
}

/// A post-policy decision plus the context needed to explain it later.
///
/// This is what the timeline stores and what the presentation layer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(flatten)]
    pub decision: Decision,
    pub focus_context: String,
    pub apps_observed: Vec<String>,
    pub source: DecisionSource,
    /// Why a nudge candidate was downgraded, if it was.
    #[serde(default)]
    pub suppressed: Option<String>,
}
