//! Activity samples and the window builder that folds them into summaries.
//!
//! Sample sources push [`ActivitySample`]s into a [`SummaryWindowBuilder`]
//! handle at whatever rate they like. The agent's window timer calls
//! [`flush`](SummaryWindowBuilder::flush) with the wall-clock time once per
//! window and gets back exactly one [`ActivitySummary`], even when nothing
//! arrived. [`close`](SummaryWindowBuilder::close) ends a window at its
//! scheduled boundary instead, for replaying recorded samples.
//!
//! # Time attribution
//!
//! Each sample owns the time from its own timestamp until the next sample
//! (or the end of the window, for the last one). Timestamps are clamped into
//! the window and kept monotone in arrival order, so late or out-of-order
//! samples never produce negative durations and the per-app breakdown can
//! never exceed the window length.

pub mod sanitize;
pub mod source;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::KairosError;
pub use sanitize::{normalize_app_name, sanitize_title};

/// Default number of window titles kept per summary.
pub const DEFAULT_TOP_WINDOWS: usize = 5;

// ── Samples ────────────────────────────────────────────────────────

/// One observation of the foreground window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub app_name: String,
    pub window_title: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivitySample {
    /// Build a sample, normalizing the app name.
    pub fn new(
        app_name: impl AsRef<str>,
        window_title: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            app_name: normalize_app_name(app_name.as_ref()),
            window_title: window_title.into(),
            timestamp,
        }
    }
}

/// A sample as it arrives on the wire, before required fields are checked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSample {
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub window_title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<RawSample> for ActivitySample {
    type Error = KairosError;

    fn try_from(raw: RawSample) -> Result<Self, Self::Error> {
        let app_name = raw
            .app_name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| KairosError::MalformedSample("missing app_name".into()))?;
        let timestamp = raw
            .timestamp
            .ok_or_else(|| KairosError::MalformedSample("missing timestamp".into()))?;
        Ok(Self::new(
            app_name,
            raw.window_title.unwrap_or_default(),
            timestamp,
        ))
    }
}

// ── Summaries ──────────────────────────────────────────────────────

/// Aggregated view of one closed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_duration_seconds: f64,
    /// Seconds attributed to each app observed in the window.
    pub app_breakdown: BTreeMap<String, f64>,
    /// Sanitized titles, most time-weighted first.
    pub top_windows: Vec<String>,
    /// Seconds per sanitized title, per app. Untitled time is omitted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub title_breakdown: BTreeMap<String, BTreeMap<String, f64>>,
    /// Adjacent sample pairs whose app differs, in arrival order.
    pub activity_switches: u32,
    #[serde(default)]
    pub sample_count: usize,
}

impl ActivitySummary {
    /// Reduce a window's samples (in arrival order) to a summary.
    ///
    /// `period_end` must be after `period_start`; callers that cannot
    /// guarantee it should go through [`SummaryWindowBuilder`].
    pub fn from_samples(
        samples: &[ActivitySample],
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        top_windows: usize,
    ) -> Self {
        let mut app_breakdown: BTreeMap<String, f64> = BTreeMap::new();
        let mut title_breakdown: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        // title -> (seconds, first appearance)
        let mut titles: HashMap<String, (f64, usize)> = HashMap::new();

        let mut cursor = period_start;
        let effective: Vec<DateTime<Utc>> = samples
            .iter()
            .map(|s| {
                let ts = s.timestamp.max(period_start).min(period_end).max(cursor);
                cursor = ts;
                ts
            })
            .collect();

        for (i, sample) in samples.iter().enumerate() {
            let until = effective.get(i + 1).copied().unwrap_or(period_end);
            let secs = seconds_between(effective[i], until);
            *app_breakdown.entry(sample.app_name.clone()).or_insert(0.0) += secs;

            let title = sanitize_title(&sample.window_title);
            if !title.is_empty() {
                *title_breakdown
                    .entry(sample.app_name.clone())
                    .or_default()
                    .entry(title.clone())
                    .or_insert(0.0) += secs;
                titles.entry(title).or_insert((0.0, i)).0 += secs;
            }
        }

        let activity_switches = samples
            .windows(2)
            .filter(|pair| pair[0].app_name != pair[1].app_name)
            .count() as u32;

        let mut ranked: Vec<(String, f64, usize)> = titles
            .into_iter()
            .map(|(title, (secs, first))| (title, secs, first))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));

        Self {
            period_start,
            period_end,
            total_duration_seconds: seconds_between(period_start, period_end),
            app_breakdown,
            top_windows: ranked
                .into_iter()
                .take(top_windows)
                .map(|(title, _, _)| title)
                .collect(),
            title_breakdown,
            activity_switches,
            sample_count: samples.len(),
        }
    }

    /// Check the invariants every builder-produced summary holds.
    ///
    /// Summaries read from elsewhere (a file, a test fixture) should pass
    /// this before they are classified.
    pub fn validate(&self) -> Result<(), String> {
        if self.period_end <= self.period_start {
            return Err(format!(
                "period_end {} must be after period_start {}",
                self.period_end, self.period_start
            ));
        }
        if !self.total_duration_seconds.is_finite() || self.total_duration_seconds < 0.0 {
            return Err(format!(
                "total_duration_seconds must be a non-negative number, got {}",
                self.total_duration_seconds
            ));
        }
        if let Some((app, secs)) = self
            .app_breakdown
            .iter()
            .find(|(_, secs)| !secs.is_finite() || **secs < 0.0)
        {
            return Err(format!("app_breakdown['{app}'] must be non-negative, got {secs}"));
        }
        let titled = self
            .title_breakdown
            .iter()
            .flat_map(|(app, titles)| titles.values().map(move |secs| (app, secs)));
        for (app, secs) in titled {
            if !secs.is_finite() || *secs < 0.0 {
                return Err(format!("title_breakdown['{app}'] must be non-negative, got {secs}"));
            }
        }
        let attributed = self.attributed_seconds();
        if attributed > self.total_duration_seconds + 1e-6 {
            return Err(format!(
                "app_breakdown sums to {attributed:.1}s, more than total_duration_seconds {:.1}s",
                self.total_duration_seconds
            ));
        }
        Ok(())
    }

    /// No samples arrived during the window.
    pub fn is_idle(&self) -> bool {
        self.sample_count == 0 && self.app_breakdown.is_empty()
    }

    /// Seconds attributed to any app.
    pub fn attributed_seconds(&self) -> f64 {
        self.app_breakdown.values().sum()
    }

    /// Apps ordered by attributed time, longest first (ties by name).
    pub fn apps_by_time(&self) -> Vec<(&str, f64)> {
        let mut apps: Vec<(&str, f64)> = self
            .app_breakdown
            .iter()
            .map(|(app, secs)| (app.as_str(), *secs))
            .collect();
        apps.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
        apps
    }

    /// The app holding the largest share of the window.
    pub fn dominant_app(&self) -> Option<&str> {
        self.apps_by_time().first().map(|(app, _)| *app)
    }

    /// One-line description of where the window went.
    pub fn focus_context(&self) -> String {
        let attributed = self.attributed_seconds();
        match self.dominant_app() {
            Some(app) if attributed > 0.0 => {
                let share = self.app_breakdown.get(app).copied().unwrap_or(0.0) / attributed;
                format!("Mostly in {app} ({:.0}%)", share * 100.0)
            }
            Some(app) => format!("Briefly in {app}"),
            None => "No activity observed".to_string(),
        }
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}

// ── Window builder ─────────────────────────────────────────────────

struct WindowBuffer {
    period_start: DateTime<Utc>,
    samples: Vec<ActivitySample>,
}

/// Buffers samples for the current window and emits one summary per close.
///
/// Cloning yields another handle to the same buffer, so a sample source and
/// the window timer can each hold one.
#[derive(Clone)]
pub struct SummaryWindowBuilder {
    buffer: Arc<Mutex<WindowBuffer>>,
    window: TimeDelta,
    top_windows: usize,
}

impl SummaryWindowBuilder {
    /// Start a builder whose first window opens at `start`.
    pub fn new(
        window: Duration,
        top_windows: usize,
        start: DateTime<Utc>,
    ) -> Result<Self, KairosError> {
        let window = TimeDelta::from_std(window)
            .ok()
            .filter(|w| *w > TimeDelta::zero())
            .ok_or_else(|| {
                KairosError::InvalidConfiguration(format!(
                    "window length {window:?} must be positive and representable"
                ))
            })?;
        Ok(Self {
            buffer: Arc::new(Mutex::new(WindowBuffer {
                period_start: start,
                samples: Vec::new(),
            })),
            window,
            top_windows,
        })
    }

    /// Add a sample to the current window.
    pub fn ingest(&self, sample: ActivitySample) {
        trace!("sample: {} / {}", sample.app_name, sample.window_title);
        let mut buf = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buf.samples.push(sample);
    }

    /// Validate and add a wire sample. Malformed samples are logged and
    /// dropped; the window carries on without them.
    pub fn ingest_raw(&self, raw: RawSample) -> Result<(), KairosError> {
        match ActivitySample::try_from(raw) {
            Ok(sample) => {
                self.ingest(sample);
                Ok(())
            }
            Err(e) => {
                warn!("Dropping sample: {e}");
                Err(e)
            }
        }
    }

    /// Number of samples waiting in the current window.
    pub fn pending(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .samples
            .len()
    }

    /// Start of the currently open window.
    pub fn period_start(&self) -> DateTime<Utc> {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .period_start
    }

    /// Close the window at its scheduled end (`period_start + window`).
    pub fn close(&self) -> ActivitySummary {
        self.close_with(|start| start + self.window)
    }

    /// Close the window early at `now`. The summary always spans a
    /// positive interval, even if `now` is not after the window start.
    pub fn flush(&self, now: DateTime<Utc>) -> ActivitySummary {
        self.close_with(|start| now.max(start + TimeDelta::milliseconds(1)))
    }

    fn close_with(&self, end_for: impl FnOnce(DateTime<Utc>) -> DateTime<Utc>) -> ActivitySummary {
        let (samples, start, end) = {
            let mut buf = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            let start = buf.period_start;
            let end = end_for(start);
            buf.period_start = end;
            (std::mem::take(&mut buf.samples), start, end)
        };

        let summary = ActivitySummary::from_samples(&samples, start, end, self.top_windows);
        debug!(
            "Window closed: {} sample(s), {} app(s), {} switch(es), {:.0}s",
            summary.sample_count,
            summary.app_breakdown.len(),
            summary.activity_switches,
            summary.total_duration_seconds
        );
        summary
    }
}
