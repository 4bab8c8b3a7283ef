//! Error taxonomy for the decision pipeline.
//!
//! Only [`KairosError::InvalidConfiguration`] is fatal, and only at startup.
//! Everything else is recovered inside the window that produced it: a
//! malformed sample is dropped, an unavailable oracle is replaced by the
//! local classifier. An empty window is not an error at all.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum KairosError {
    /// The decision oracle timed out, was unreachable, or answered with
    /// something we could not trust.
    BackendUnavailable(String),
    /// Configuration rejected by [`AgentConfig::validate`](crate::agent::config::AgentConfig::validate).
    InvalidConfiguration(String),
    /// A raw sample was missing a required field.
    MalformedSample(String),
}

impl fmt::Display for KairosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackendUnavailable(msg) => write!(f, "decision backend unavailable: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::MalformedSample(msg) => write!(f, "malformed sample: {msg}"),
        }
    }
}

impl std::error::Error for KairosError {}
