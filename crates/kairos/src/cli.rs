//! Command-line plumbing shared by the `kairos` and `kairos-web` binaries.
//!
//! [`ConfigArgs`] is flattened into each binary's clap parser. It layers
//! flags and `KAIROS_*` environment variables over an optional JSON config
//! file, which in turn overrides [`AgentConfig::default`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::KairosError;
use crate::agent::config::AgentConfig;
use crate::oracle::OracleMode;

/// Configuration flags common to every binary.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// JSON config file. Flags and env vars override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Comma-separated goals, highest priority first.
    #[arg(long, env = "KAIROS_GOALS", value_delimiter = ',')]
    pub goals: Option<Vec<String>>,

    /// Where decisions come from.
    #[arg(long, env = "KAIROS_ORACLE_MODE", value_enum)]
    pub oracle_mode: Option<OracleMode>,

    /// Base URL of the live decision backend.
    #[arg(long, env = "KAIROS_ORACLE_URL")]
    pub oracle_url: Option<String>,

    /// Window length in seconds.
    #[arg(long, env = "KAIROS_WINDOW_SECS")]
    pub window_secs: Option<u64>,

    /// Minimum seconds between nudges.
    #[arg(long)]
    pub cooldown_secs: Option<u64>,

    /// Minimum confidence for a nudge, in [0, 1].
    #[arg(long)]
    pub nudge_threshold: Option<f64>,
}

impl ConfigArgs {
    /// Resolve defaults, file, then flags into a validated config.
    pub fn resolve(&self) -> Result<AgentConfig, KairosError> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)?,
            None => AgentConfig::default(),
        };
        if let Some(goals) = &self.goals {
            config = config.with_goals(goals.iter().cloned());
        }
        if let Some(mode) = self.oracle_mode {
            config = config.with_oracle_mode(mode);
        }
        if let Some(url) = &self.oracle_url {
            config = config.with_oracle_endpoint(url.trim());
        }
        if let Some(secs) = self.window_secs {
            config = config.with_window_length(Duration::from_secs(secs));
        }
        if let Some(secs) = self.cooldown_secs {
            config = config.with_cooldown(Duration::from_secs(secs));
        }
        if let Some(threshold) = self.nudge_threshold {
            config = config.with_nudge_threshold(threshold);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Install the global tracing subscriber: fmt to stderr, filtered by
/// `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn parse(args: &[&str]) -> ConfigArgs {
        TestCli::try_parse_from(std::iter::once("kairos").chain(args.iter().copied()))
            .unwrap()
            .config
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--goals",
            "writing,design",
            "--oracle-mode",
            "offline",
            "--window-secs",
            "30",
        ])
        .resolve()
        .unwrap();
        assert_eq!(config.goals, vec!["writing", "design"]);
        assert_eq!(config.oracle_mode, OracleMode::Offline);
        assert_eq!(config.window_length, Duration::from_secs(30));
        assert_eq!(config.cooldown_period, Duration::from_secs(900));
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"window_length_secs": 120, "cooldown_secs": 60}}"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = parse(&["--config", &path, "--window-secs", "45"])
            .resolve()
            .unwrap();
        assert_eq!(config.window_length, Duration::from_secs(45));
        assert_eq!(config.cooldown_period, Duration::from_secs(60));
    }

    #[test]
    fn invalid_flags_fail_validation() {
        let err = parse(&["--nudge-threshold", "2.0"]).resolve().unwrap_err();
        assert!(matches!(err, KairosError::InvalidConfiguration(_)));
    }
}
