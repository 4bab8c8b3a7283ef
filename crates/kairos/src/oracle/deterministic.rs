//! Oracles that never leave the process.

use tracing::trace;

use super::{DecisionOracle, OracleError, OracleFuture, OracleRequest, local_decision};

/// Decides from the request's local classification alone.
///
/// Identical requests always produce identical decisions, which keeps the
/// agent testable without a network.
#[derive(Debug, Clone)]
pub struct DeterministicOracle {
    nudge_threshold: f64,
}

impl DeterministicOracle {
    pub fn new(nudge_threshold: f64) -> Self {
        Self { nudge_threshold }
    }
}

impl DecisionOracle for DeterministicOracle {
    fn name(&self) -> &str {
        "deterministic"
    }

    fn decide<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async move {
            let decision = local_decision(
                &request.local_classification,
                &request.user_goals,
                self.nudge_threshold,
                request.activity_summary.period_end,
            );
            trace!("Deterministic oracle: {} / {}", decision.intent, decision.action);
            Ok(decision)
        })
    }
}

/// Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

impl DecisionOracle for OfflineOracle {
    fn name(&self) -> &str {
        "offline"
    }

    fn decide<'a>(&'a self, _request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async { Err(OracleError::Unavailable("configured offline".into())) })
    }
}
