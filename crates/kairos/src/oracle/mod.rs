//! Decision oracles: the authoritative path from a summary to a decision.
//!
//! A [`DecisionOracle`] receives an [`OracleRequest`] (the summary, the
//! user's goals, and the local classification for context) and returns a
//! [`Decision`]. Three implementations ship with the crate:
//!
//! | Oracle | Mode | Behavior |
//! |--------|------|----------|
//! | [`HttpOracle`] | `live` | `POST {endpoint}/analyze`, schema-validated, retried on transient errors |
//! | [`DeterministicOracle`] | `deterministic` | Pure function of the local classification |
//! | [`OfflineOracle`] | `offline` | Always unavailable; every window takes the fallback path |
//!
//! The agent bounds every call with a timeout. Any failure becomes
//! [`KairosError::BackendUnavailable`] and is answered with
//! [`fallback_decision`], which never nudges.

mod deterministic;
mod http;
pub mod retry;

pub use deterministic::{DeterministicOracle, OfflineOracle};
pub use http::HttpOracle;
pub use retry::RetryConfig;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivitySummary;
use crate::agent::config::AgentConfig;
use crate::classifier::Classification;
use crate::{Decision, Intent, KairosError};

// ── Request / error types ──────────────────────────────────────────

/// Everything an oracle gets to look at for one window.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub activity_summary: ActivitySummary,
    pub user_goals: Vec<String>,
    pub local_classification: Classification,
}

/// Why an oracle could not produce a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleError {
    /// The call did not finish within the configured bound.
    Timeout(Duration),
    /// The oracle is configured off.
    Unavailable(String),
    /// Non-2xx response.
    Http { status: u16, body: String },
    /// Connection-level failure.
    Transport(String),
    /// The response could not be trusted.
    Malformed(String),
}

impl OracleError {
    /// Worth retrying: rate limits, server errors, and connection failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || (500..=504).contains(status),
            Self::Transport(_) => true,
            Self::Timeout(_) | Self::Unavailable(_) | Self::Malformed(_) => false,
        }
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(after) => write!(f, "timed out after {after:?}"),
            Self::Unavailable(why) => write!(f, "oracle unavailable: {why}"),
            Self::Http { status, body } => {
                let preview: String = body.chars().take(200).collect();
                write!(f, "HTTP {status}: {preview}")
            }
            Self::Transport(msg) => write!(f, "request failed: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl From<OracleError> for KairosError {
    fn from(e: OracleError) -> Self {
        KairosError::BackendUnavailable(e.to_string())
    }
}

// ── Oracle trait ───────────────────────────────────────────────────

/// Boxed future returned by [`DecisionOracle::decide`].
pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = Result<Decision, OracleError>> + Send + 'a>>;

/// A source of decisions for activity windows.
///
/// Implementations must be cheap to call concurrently with sample
/// ingestion; the agent never has more than one `decide` in flight.
///
/// # Example
///
/// ```ignore
/// struct AlwaysObserve;
///
/// impl DecisionOracle for AlwaysObserve {
///     fn name(&self) -> &str { "always-observe" }
///
///     fn decide<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
///         Box::pin(async move {
///             Ok(Decision::observe(
///                 request.local_classification.intent,
///                 request.local_classification.confidence,
///                 "Observing only.",
///                 request.activity_summary.period_end,
///             ))
///         })
///     }
/// }
/// ```
pub trait DecisionOracle: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Produce a decision for one window.
    fn decide<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a>;
}

/// How the agent obtains authoritative decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OracleMode {
    /// Remote backend over HTTP.
    Live,
    /// Local, reproducible decisions from the classifier.
    #[default]
    Deterministic,
    /// No oracle; every window uses the degraded fallback.
    Offline,
}

impl fmt::Display for OracleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Deterministic => write!(f, "deterministic"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

/// Build the oracle selected by `config.oracle_mode`.
pub fn build_oracle(config: &AgentConfig) -> Result<Arc<dyn DecisionOracle>, KairosError> {
    Ok(match config.oracle_mode {
        OracleMode::Live => Arc::new(
            HttpOracle::new(&config.oracle_endpoint, config.oracle_timeout)
                .map_err(KairosError::InvalidConfiguration)?,
        ),
        OracleMode::Deterministic => {
            Arc::new(DeterministicOracle::new(config.nudge_confidence_threshold))
        }
        OracleMode::Offline => Arc::new(OfflineOracle),
    })
}

// ── Local decisions ────────────────────────────────────────────────

/// Turn a local classification into a candidate decision.
///
/// Nudges when the window looks unproductive with at least
/// `nudge_threshold` confidence; otherwise observes.
pub fn local_decision(
    classification: &Classification,
    goals: &[String],
    nudge_threshold: f64,
    timestamp: DateTime<Utc>,
) -> Decision {
    if classification.intent == Intent::Unproductive && classification.confidence >= nudge_threshold
    {
        Decision::nudge(
            classification.intent,
            classification.confidence,
            classification.reasoning.clone(),
            default_nudge_message(goals, timestamp),
            timestamp,
        )
    } else {
        Decision::observe(
            classification.intent,
            classification.confidence,
            classification.reasoning.clone(),
            timestamp,
        )
    }
}

/// The degraded decision used when the oracle fails: local intent and
/// confidence, never a nudge.
pub fn fallback_decision(
    classification: &Classification,
    error: &KairosError,
    timestamp: DateTime<Utc>,
) -> Decision {
    let why = match error {
        KairosError::BackendUnavailable(msg) => msg.clone(),
        other => other.to_string(),
    };
    Decision::observe(
        classification.intent,
        classification.confidence,
        format!(
            "Decision service unavailable ({why}); using local heuristics. {}",
            classification.reasoning
        ),
        timestamp,
    )
}

/// A friendly nudge built from the first goal.
///
/// The variant is picked from the window's timestamp, so the same window
/// always gets the same wording.
pub fn default_nudge_message(goals: &[String], timestamp: DateTime<Utc>) -> String {
    let goal = goals
        .iter()
        .map(|g| g.trim())
        .find(|g| !g.is_empty())
        .unwrap_or("your goals");
    let variants = [
        format!("Ready to get back to {goal}? You've got this."),
        format!("Quick check-in: how is {goal} going?"),
        format!("Breaks are good. When you're ready, {goal} is waiting."),
        format!("Gentle reminder: you wanted to focus on {goal} today."),
    ];
    let index = (timestamp.timestamp().div_euclid(60)).rem_euclid(variants.len() as i64) as usize;
    variants[index].clone()
}
