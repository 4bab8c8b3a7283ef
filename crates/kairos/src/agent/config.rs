//! Agent configuration.
//!
//! [`AgentConfig`] carries every tunable of the pipeline. Values come from
//! [`Default`], then an optional JSON file ([`AgentConfig::from_file`]),
//! then CLI flags and environment variables applied by the binaries through
//! the `with_*` builders. [`validate`](AgentConfig::validate) must pass
//! before the loop starts.
//!
//! # Example
//!
//! ```
//! use kairos::agent::config::AgentConfig;
//! use std::time::Duration;
//!
//! let config = AgentConfig::default()
//!     .with_window_length(Duration::from_secs(120))
//!     .with_goals(["coding"]);
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::KairosError;
use crate::activity::DEFAULT_TOP_WINDOWS;
use crate::classifier::LocalClassifier;
use crate::oracle::OracleMode;
use crate::policy::PolicyConfig;
use crate::state::DEFAULT_TIMELINE_CAPACITY;

/// Default oracle endpoint for live mode.
pub const DEFAULT_ORACLE_ENDPOINT: &str = "http://localhost:8080";

/// Full configuration for an [`Agent`](super::Agent).
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Length of one summary window. Default: 5 minutes.
    pub window_length: Duration,
    /// Minimum gap between nudges. Default: 15 minutes.
    pub cooldown_period: Duration,
    /// Candidates below this confidence never nudge. Default: `0.6`.
    pub nudge_confidence_threshold: f64,
    /// Consecutive unproductive windows required before a nudge. Default: `2`.
    pub consecutive_intent_threshold: u32,
    /// Nudges allowed per trailing hour (`0` = unlimited). Default: `3`.
    pub max_nudges_per_hour: u32,
    /// Stated goals, in priority order. Default: coding, learning, writing.
    pub goals: Vec<String>,
    /// Upper bound on one oracle decision, retries included. Default: 5s.
    pub oracle_timeout: Duration,
    /// Local confidence at which the oracle is skipped. Default: `0.85`.
    pub oracle_skip_threshold: f64,
    /// Where decisions come from. Default: deterministic.
    pub oracle_mode: OracleMode,
    /// Base URL for live mode.
    pub oracle_endpoint: String,
    /// Decisions kept in the timeline. Default: `50`.
    pub timeline_capacity: usize,
    /// Titles kept per summary. Default: `5`.
    pub top_windows: usize,
    /// Apps always treated as productive.
    pub custom_productive: Vec<String>,
    /// Apps always treated as distractions.
    pub custom_unproductive: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            window_length: Duration::from_secs(300),
            cooldown_period: Duration::from_secs(900),
            nudge_confidence_threshold: 0.6,
            consecutive_intent_threshold: 2,
            max_nudges_per_hour: 3,
            goals: vec!["coding".into(), "learning".into(), "writing".into()],
            oracle_timeout: Duration::from_secs(5),
            oracle_skip_threshold: 0.85,
            oracle_mode: OracleMode::Deterministic,
            oracle_endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
            timeline_capacity: DEFAULT_TIMELINE_CAPACITY,
            top_windows: DEFAULT_TOP_WINDOWS,
            custom_productive: Vec::new(),
            custom_unproductive: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn with_window_length(mut self, window: Duration) -> Self {
        self.window_length = window;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_period = cooldown;
        self
    }

    pub fn with_nudge_threshold(mut self, threshold: f64) -> Self {
        self.nudge_confidence_threshold = threshold;
        self
    }

    pub fn with_streak_threshold(mut self, windows: u32) -> Self {
        self.consecutive_intent_threshold = windows;
        self
    }

    /// Replace the stated goals. Blank entries are dropped.
    pub fn with_goals<I, S>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goals = goals
            .into_iter()
            .map(Into::into)
            .map(|g: String| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
        self
    }

    pub fn with_oracle_mode(mut self, mode: OracleMode) -> Self {
        self.oracle_mode = mode;
        self
    }

    /// Point at a live backend. Does not change the mode.
    pub fn with_oracle_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.oracle_endpoint = endpoint.into();
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn with_timeline_capacity(mut self, capacity: usize) -> Self {
        self.timeline_capacity = capacity;
        self
    }

    /// Reject configurations the loop cannot run with.
    pub fn validate(&self) -> Result<(), KairosError> {
        let invalid = |msg: String| Err(KairosError::InvalidConfiguration(msg));

        if self.window_length.is_zero() {
            return invalid("window_length must be positive".into());
        }
        if self.cooldown_period.is_zero() {
            return invalid("cooldown_period must be positive".into());
        }
        if self.oracle_timeout.is_zero() {
            return invalid("oracle_timeout must be positive".into());
        }
        for (name, value) in [
            ("nudge_confidence_threshold", self.nudge_confidence_threshold),
            ("oracle_skip_threshold", self.oracle_skip_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        if self.consecutive_intent_threshold == 0 {
            return invalid("consecutive_intent_threshold must be at least 1".into());
        }
        if self.timeline_capacity == 0 {
            return invalid("timeline_capacity must be at least 1".into());
        }
        if self.top_windows == 0 {
            return invalid("top_windows must be at least 1".into());
        }
        if self.goals.is_empty() {
            return invalid("at least one goal is required".into());
        }
        if self.goals.iter().any(|g| g.trim().is_empty()) {
            return invalid("goals must not be blank".into());
        }
        if self.oracle_mode == OracleMode::Live
            && !(self.oracle_endpoint.starts_with("http://")
                || self.oracle_endpoint.starts_with("https://"))
        {
            return invalid(format!(
                "live oracle mode needs an http(s) endpoint, got '{}'",
                self.oracle_endpoint
            ));
        }
        Ok(())
    }

    /// Policy tunables derived from this config.
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            nudge_confidence_threshold: self.nudge_confidence_threshold,
            cooldown_period: self.cooldown_period,
            consecutive_intent_threshold: self.consecutive_intent_threshold,
            max_nudges_per_hour: self.max_nudges_per_hour,
        }
    }

    /// A classifier with this config's custom lists.
    pub fn classifier(&self) -> LocalClassifier {
        LocalClassifier::default()
            .with_custom_productive(self.custom_productive.iter().cloned())
            .with_custom_unproductive(self.custom_unproductive.iter().cloned())
    }

    /// Load defaults overlaid with a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, KairosError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KairosError::InvalidConfiguration(format!(
                "failed to read config '{}': {e}",
                path.display()
            ))
        })?;
        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            KairosError::InvalidConfiguration(format!(
                "failed to parse config '{}': {e}",
                path.display()
            ))
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(Self::default().merge(file))
    }

    fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(secs) = file.window_length_secs {
            self.window_length = Duration::from_secs(secs);
        }
        if let Some(secs) = file.cooldown_secs {
            self.cooldown_period = Duration::from_secs(secs);
        }
        if let Some(v) = file.nudge_confidence_threshold {
            self.nudge_confidence_threshold = v;
        }
        if let Some(v) = file.consecutive_intent_threshold {
            self.consecutive_intent_threshold = v;
        }
        if let Some(v) = file.max_nudges_per_hour {
            self.max_nudges_per_hour = v;
        }
        if let Some(goals) = file.goals {
            self = self.with_goals(goals);
        }
        if let Some(secs) = file.oracle_timeout_secs {
            self.oracle_timeout = Duration::from_secs_f64(secs.max(0.0));
        }
        if let Some(v) = file.oracle_skip_threshold {
            self.oracle_skip_threshold = v;
        }
        if let Some(mode) = file.oracle_mode {
            self.oracle_mode = mode;
        }
        if let Some(endpoint) = file.oracle_endpoint {
            self.oracle_endpoint = endpoint;
        }
        if let Some(v) = file.timeline_capacity {
            self.timeline_capacity = v;
        }
        if let Some(v) = file.top_windows {
            self.top_windows = v;
        }
        if let Some(apps) = file.custom_productive {
            self.custom_productive = apps;
        }
        if let Some(apps) = file.custom_unproductive {
            self.custom_unproductive = apps;
        }
        self
    }
}

/// On-disk config. Every field is optional; durations are in seconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    window_length_secs: Option<u64>,
    cooldown_secs: Option<u64>,
    nudge_confidence_threshold: Option<f64>,
    consecutive_intent_threshold: Option<u32>,
    max_nudges_per_hour: Option<u32>,
    goals: Option<Vec<String>>,
    oracle_timeout_secs: Option<f64>,
    oracle_skip_threshold: Option<f64>,
    oracle_mode: Option<OracleMode>,
    oracle_endpoint: Option<String>,
    timeline_capacity: Option<usize>,
    top_windows: Option<usize>,
    custom_productive: Option<Vec<String>>,
    custom_unproductive: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let c = AgentConfig::default();
        assert_eq!(c.window_length, Duration::from_secs(300));
        assert_eq!(c.cooldown_period, Duration::from_secs(900));
        assert!((c.nudge_confidence_threshold - 0.6).abs() < f64::EPSILON);
        assert_eq!(c.consecutive_intent_threshold, 2);
        assert_eq!(c.goals, vec!["coding", "learning", "writing"]);
        assert_eq!(c.oracle_timeout, Duration::from_secs(5));
        assert_eq!(c.oracle_mode, OracleMode::Deterministic);
        assert_eq!(c.timeline_capacity, 50);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            AgentConfig::default().with_window_length(Duration::ZERO),
            AgentConfig::default().with_cooldown(Duration::ZERO),
            AgentConfig::default().with_nudge_threshold(1.5),
            AgentConfig::default().with_nudge_threshold(-0.1),
            AgentConfig::default().with_nudge_threshold(f64::NAN),
            AgentConfig::default().with_streak_threshold(0),
            AgentConfig::default().with_timeline_capacity(0),
            AgentConfig::default().with_goals(["  "]),
            AgentConfig::default().with_oracle_timeout(Duration::ZERO),
            AgentConfig::default()
                .with_oracle_mode(OracleMode::Live)
                .with_oracle_endpoint("ftp://nope"),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(KairosError::InvalidConfiguration(_))),
                "{config:?} should be invalid"
            );
        }
    }

    #[test]
    fn with_goals_trims_and_drops_blanks() {
        let c = AgentConfig::default().with_goals([" coding ", "", "design"]);
        assert_eq!(c.goals, vec!["coding", "design"]);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "window_length_secs": 60,
                "cooldown_secs": 120,
                "goals": ["writing"],
                "oracle_mode": "live",
                "oracle_endpoint": "http://127.0.0.1:9000",
                "oracle_timeout_secs": 1.5,
                "custom_unproductive": ["Solitaire"]
            }}"#
        )
        .unwrap();

        let c = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(c.window_length, Duration::from_secs(60));
        assert_eq!(c.cooldown_period, Duration::from_secs(120));
        assert_eq!(c.goals, vec!["writing"]);
        assert_eq!(c.oracle_mode, OracleMode::Live);
        assert_eq!(c.oracle_timeout, Duration::from_millis(1500));
        assert_eq!(c.consecutive_intent_threshold, 2);
        assert!(c.validate().is_ok());

        let (category, _) = c.classifier().categorize("Solitaire", &c.goals).unwrap();
        assert_eq!(category, crate::classifier::Category::Unproductive);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"window_secs": 60}}"#).unwrap();
        assert!(matches!(
            AgentConfig::from_file(file.path()),
            Err(KairosError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn missing_file_is_invalid_configuration() {
        let err = AgentConfig::from_file(Path::new("/nonexistent/kairos.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
