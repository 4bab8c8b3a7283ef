//! Sample sources that feed a [`SummaryWindowBuilder`].
//!
//! The agent does not poll the OS itself. Samples arrive either as JSON
//! lines (one [`RawSample`] per line, typically piped from a platform
//! tracker on stdin) or from [`DemoSource`], a fixed script of apps used
//! for demos and tests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ActivitySample, RawSample, SummaryWindowBuilder};

/// Default demo poll interval.
pub const DEMO_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Counts reported when a source finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub accepted: usize,
    pub dropped: usize,
}

/// Read JSON-line samples until EOF or cancellation.
///
/// Blank lines are skipped. Lines that fail to parse or lack required
/// fields are logged and dropped without interrupting the stream.
pub async fn pump_json_lines<R>(
    reader: R,
    builder: SummaryWindowBuilder,
    cancel: CancellationToken,
) -> SourceStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = SourceStats::default();
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Sample stream reached EOF");
                break;
            }
            Err(e) => {
                warn!("Sample stream read error: {e}");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let raw: RawSample = match serde_json::from_str(trimmed) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Dropping unparseable sample line: {e}");
                stats.dropped += 1;
                continue;
            }
        };

        match builder.ingest_raw(raw) {
            Ok(()) => stats.accepted += 1,
            Err(_) => stats.dropped += 1,
        }
    }

    info!(
        "Sample stream finished: {} accepted, {} dropped",
        stats.accepted, stats.dropped
    );
    stats
}

/// Scripted (app, title) pairs the demo source cycles through.
const DEMO_SCRIPT: &[(&str, &str)] = &[
    ("Visual Studio Code", "main.rs - kairos"),
    ("Google Chrome", "Stack Overflow - tokio select"),
    ("Slack", "team-engineering"),
    ("Visual Studio Code", "agent.rs - kairos"),
    ("Spotify", "Focus Flow Playlist"),
    ("Google Chrome", "YouTube - Cat Videos"),
    ("Visual Studio Code", "README.md - kairos"),
    ("Microsoft Teams", "Standup Meeting"),
];

/// Deterministic stand-in for an OS activity tracker.
///
/// Each poll returns the current scripted app; the script advances every
/// `dwell` polls, so a run always produces the same sequence of samples.
#[derive(Debug, Clone)]
pub struct DemoSource {
    polls: usize,
    dwell: usize,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new(5)
    }
}

impl DemoSource {
    pub fn new(dwell: usize) -> Self {
        Self {
            polls: 0,
            dwell: dwell.max(1),
        }
    }

    /// Produce the next scripted sample stamped at `now`.
    pub fn next_sample(&mut self, now: DateTime<Utc>) -> ActivitySample {
        let (app, title) = DEMO_SCRIPT[(self.polls / self.dwell) % DEMO_SCRIPT.len()];
        self.polls += 1;
        ActivitySample::new(app, title, now)
    }

    /// Poll on `interval` until cancelled, feeding `builder`.
    pub async fn run(
        mut self,
        builder: SummaryWindowBuilder,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        info!("Demo activity source started (every {interval:?})");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => builder.ingest(self.next_sample(Utc::now())),
            }
        }
        debug!("Demo activity source stopped after {} poll(s)", self.polls);
    }
}
