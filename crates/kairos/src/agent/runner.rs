//! The agent loop: window timer, decide task, and pipeline wiring.
//!
//! ```text
//! source task ──ingest──▶ SummaryWindowBuilder
//!                               │ flush(now) every window_length
//! timer task ──(seq, summary)──▶ watch channel (latest wins)
//!                               │
//! decide task ── classify ─▶ oracle (bounded) / local ─▶ policy ─▶ store + events
//! ```
//!
//! The decide task handles one window at a time, so at most one oracle
//! call is ever in flight. If windows close faster than decisions finish,
//! intermediate summaries are overwritten and counted as skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::BufReader;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::AgentConfig;
use super::events::{AgentEvent, EventHandler, NoopHandler};
use crate::activity::source::{DEMO_POLL_INTERVAL, DemoSource, pump_json_lines};
use crate::activity::{ActivitySummary, SummaryWindowBuilder};
use crate::classifier::LocalClassifier;
use crate::oracle::{
    DecisionOracle, OracleError, OracleRequest, build_oracle, fallback_decision, local_decision,
};
use crate::policy::NudgePolicy;
use crate::state::{AgentStateStore, AgentStatus};
use crate::{Decision, DecisionRecord, DecisionSource, KairosError};

type WindowSlot = Option<(u64, ActivitySummary)>;

/// One process's decision pipeline.
///
/// Owns the classifier, the oracle handle, and the nudge policy. The state
/// store is injected so other components (the REST layer) can read it.
pub struct Agent {
    config: AgentConfig,
    builder: SummaryWindowBuilder,
    classifier: LocalClassifier,
    oracle: Arc<dyn DecisionOracle>,
    policy: NudgePolicy,
    store: AgentStateStore,
    handler: Box<dyn EventHandler>,
}

impl Agent {
    /// Validate `config` and build the pipeline. The first window opens now.
    pub fn new(config: AgentConfig, store: AgentStateStore) -> Result<Self, KairosError> {
        config.validate()?;
        let builder = SummaryWindowBuilder::new(config.window_length, config.top_windows, Utc::now())?;
        let oracle = build_oracle(&config)?;
        info!(
            "Agent configured: window={:?}, oracle={}, goals={}",
            config.window_length,
            oracle.name(),
            config.goals.join(", ")
        );
        Ok(Self {
            classifier: config.classifier(),
            policy: NudgePolicy::new(config.policy_config()),
            config,
            builder,
            oracle,
            store,
            handler: Box::new(NoopHandler),
        })
    }

    /// Replace the oracle chosen by `oracle_mode`.
    pub fn with_oracle(mut self, oracle: Arc<dyn DecisionOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Box::new(handler);
        self
    }

    /// A handle for feeding samples into the current window.
    pub fn builder(&self) -> SummaryWindowBuilder {
        self.builder.clone()
    }

    pub fn store(&self) -> &AgentStateStore {
        &self.store
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn emit(&self, event: AgentEvent<'_>) {
        self.handler.on_event(&event);
    }

    /// Decide one closed window and record the result.
    ///
    /// Never fails: oracle errors and timeouts become the fallback decision.
    pub async fn process_window(&mut self, summary: ActivitySummary) -> DecisionRecord {
        self.store.record_stats(|s| s.windows_processed += 1);
        self.emit(AgentEvent::WindowClosed { summary: &summary });

        let classification = self.classifier.classify(&summary, &self.config.goals);
        self.emit(AgentEvent::Classified {
            classification: &classification,
        });

        let timestamp = summary.period_end;
        let (candidate, source) = if classification.is_decisive(self.config.oracle_skip_threshold) {
            self.store.record_stats(|s| s.oracle_skipped += 1);
            self.emit(AgentEvent::OracleSkipped {
                confidence: classification.confidence,
            });
            let decision = local_decision(
                &classification,
                &self.config.goals,
                self.config.nudge_confidence_threshold,
                timestamp,
            );
            (decision, DecisionSource::Local)
        } else {
            let request = OracleRequest {
                activity_summary: summary.clone(),
                user_goals: self.config.goals.clone(),
                local_classification: classification.clone(),
            };
            match self.ask_oracle(&request).await {
                Ok(decision) => (decision, DecisionSource::Oracle),
                Err(error) => {
                    self.store.record_stats(|s| s.oracle_failures += 1);
                    self.emit(AgentEvent::OracleFailed { error: &error });
                    (
                        fallback_decision(&classification, &error, timestamp),
                        DecisionSource::Fallback,
                    )
                }
            }
        };

        let outcome = self.policy.apply(candidate);
        if let Some(reason) = outcome.suppressed {
            self.emit(AgentEvent::NudgeSuppressed { reason });
        }

        let record = DecisionRecord {
            decision: outcome.decision,
            focus_context: summary.focus_context(),
            apps_observed: summary
                .apps_by_time()
                .into_iter()
                .map(|(app, _)| app.to_string())
                .collect(),
            source,
            suppressed: outcome.suppressed.map(|r| r.to_string()),
        };

        self.store.update(record.clone());
        self.emit(AgentEvent::DecisionRecorded { record: &record });
        if let Some(message) = record.decision.nudge_message.as_deref() {
            self.emit(AgentEvent::Nudge {
                message,
                record: &record,
            });
        }
        record
    }

    async fn ask_oracle(&self, request: &OracleRequest) -> Result<Decision, KairosError> {
        self.store.record_stats(|s| s.oracle_calls += 1);
        let bound = self.config.oracle_timeout;
        debug!("Asking {} oracle (timeout {bound:?})", self.oracle.name());
        match tokio::time::timeout(bound, self.oracle.decide(request)).await {
            Ok(Ok(mut decision)) => {
                decision.timestamp = request.activity_summary.period_end;
                Ok(decision)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(OracleError::Timeout(bound).into()),
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Spawns the window timer and consumes its summaries one at a time. A
    /// decision still in flight at cancellation is dropped without being
    /// recorded. The store's status is `stopped` when this returns.
    pub async fn run(mut self, cancel: CancellationToken) {
        let (tx, mut rx) = watch::channel::<WindowSlot>(None);
        let timer = tokio::spawn(window_timer(
            self.builder.clone(),
            self.config.window_length,
            tx,
            cancel.clone(),
        ));

        let mut last_seq = 0u64;
        let mut dropped_in_flight = false;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let Some((seq, summary)) = rx.borrow_and_update().clone() else {
                        continue;
                    };

                    let skipped = seq.saturating_sub(last_seq + 1);
                    if skipped > 0 {
                        self.store.record_stats(|s| s.windows_skipped += skipped);
                        self.emit(AgentEvent::WindowsSkipped { count: skipped });
                    }
                    last_seq = seq;

                    let finished = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        _ = self.process_window(summary) => true,
                    };
                    if !finished {
                        dropped_in_flight = true;
                        break;
                    }
                }
            }
        }

        cancel.cancel();
        if let Err(e) = timer.await {
            debug!("Window timer ended abnormally: {e}");
        }
        self.store.set_status(AgentStatus::Stopped);
        self.emit(AgentEvent::Stopped { dropped_in_flight });
    }
}

/// Close the builder every `window` and publish the summary.
///
/// Windows end at the wall clock rather than at `period_start + window`:
/// the tick is monotonic and can fall behind real time (suspend, delayed
/// ticks), while sample timestamps always follow the wall clock.
async fn window_timer(
    builder: SummaryWindowBuilder,
    window: Duration,
    tx: watch::Sender<WindowSlot>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + window, window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut seq = 0u64;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                seq += 1;
                if tx.send(Some((seq, builder.flush(Utc::now())))).is_err() {
                    break;
                }
            }
        }
    }
    debug!("Window timer stopped after {seq} window(s)");
}

// ── Pipeline wiring ────────────────────────────────────────────────

/// Where samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    /// JSON lines on stdin.
    Stdin,
    /// The scripted demo source, polled every `interval`.
    Demo { interval: Duration },
}

impl SampleSource {
    pub fn demo() -> Self {
        Self::Demo {
            interval: DEMO_POLL_INTERVAL,
        }
    }
}

/// Spawn the sample source and the agent loop. Both stop on `cancel`.
pub fn spawn_pipeline(
    agent: Agent,
    source: SampleSource,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let builder = agent.builder();
    let source_task = match source {
        SampleSource::Stdin => {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let reader = BufReader::new(tokio::io::stdin());
                let stats = pump_json_lines(reader, builder, cancel).await;
                info!(
                    "Sample stream closed: {} accepted, {} dropped",
                    stats.accepted, stats.dropped
                );
            })
        }
        SampleSource::Demo { interval } => {
            tokio::spawn(DemoSource::default().run(builder, interval, cancel.clone()))
        }
    };
    let agent_task = tokio::spawn(agent.run(cancel));
    vec![source_task, agent_task]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivitySample;
    use crate::agent::events::FnEventHandler;
    use crate::oracle::{OracleFuture, OracleMode};
    use crate::{Action, Intent};
    use chrono::{DateTime, TimeDelta, TimeZone};
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    /// A five-minute window starting `index` windows after `t0`.
    fn window(index: i64, apps: &[(&str, i64)]) -> ActivitySummary {
        let start = t0() + TimeDelta::minutes(5 * index);
        let mut at = start;
        let samples: Vec<ActivitySample> = apps
            .iter()
            .map(|(app, secs)| {
                let sample = ActivitySample::new(*app, "", at);
                at += TimeDelta::seconds(*secs);
                sample
            })
            .collect();
        ActivitySummary::from_samples(&samples, start, start + TimeDelta::minutes(5), 5)
    }

    fn agent(config: AgentConfig) -> Agent {
        Agent::new(config, AgentStateStore::default()).unwrap()
    }

    struct SlowOracle;

    impl DecisionOracle for SlowOracle {
        fn name(&self) -> &str {
            "slow"
        }

        fn decide<'a>(&'a self, _request: &'a OracleRequest) -> OracleFuture<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(OracleError::Unavailable("unreachable".into()))
            })
        }
    }

    #[tokio::test]
    async fn decisive_window_skips_oracle() {
        let mut agent = agent(AgentConfig::default().with_goals(["coding"]));
        let record = agent.process_window(window(0, &[("Video", 300)])).await;

        assert_eq!(record.source, DecisionSource::Local);
        assert_eq!(record.decision.intent, Intent::Unproductive);
        assert_eq!(record.decision.timestamp, t0() + TimeDelta::minutes(5));
        assert_eq!(record.apps_observed, vec!["Video"]);

        let stats = agent.store().stats();
        assert_eq!(stats.oracle_skipped, 1);
        assert_eq!(stats.oracle_calls, 0);
    }

    #[tokio::test]
    async fn mixed_window_asks_oracle() {
        let mut agent = agent(AgentConfig::default().with_goals(["coding"]));
        let record = agent
            .process_window(window(0, &[("IDE", 200), ("Video", 100)]))
            .await;

        assert_eq!(record.source, DecisionSource::Oracle);
        assert_eq!(record.decision.intent, Intent::Productive);
        assert!((record.decision.confidence - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(record.decision.action, Action::Observe);
        assert_eq!(agent.store().get().status, AgentStatus::Observing);
    }

    #[tokio::test]
    async fn offline_oracle_falls_back_deterministically() {
        let config = AgentConfig::default()
            .with_goals(["coding"])
            .with_oracle_mode(OracleMode::Offline);
        let summary = window(0, &[("IDE", 200), ("Video", 100)]);

        let a = agent(config.clone()).process_window(summary.clone()).await;
        let b = agent(config).process_window(summary).await;

        assert_eq!(a, b);
        assert_eq!(a.source, DecisionSource::Fallback);
        assert_eq!(a.decision.action, Action::Observe);
        assert!(a.decision.reasoning.starts_with("Decision service unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_oracle_times_out_into_fallback() {
        let config = AgentConfig::default()
            .with_goals(["coding"])
            .with_oracle_timeout(Duration::from_millis(50));
        let mut agent = agent(config).with_oracle(Arc::new(SlowOracle));

        let record = agent
            .process_window(window(0, &[("IDE", 200), ("Video", 100)]))
            .await;

        assert_eq!(record.source, DecisionSource::Fallback);
        assert!(record.decision.reasoning.contains("timed out"));
        assert_eq!(agent.store().get().status, AgentStatus::Degraded);
        assert_eq!(agent.store().stats().oracle_failures, 1);
    }

    #[tokio::test]
    async fn sustained_distraction_nudges_once_per_streak() {
        let nudges = Arc::new(Mutex::new(Vec::new()));
        let sink = nudges.clone();
        let mut agent = agent(AgentConfig::default().with_goals(["coding"])).with_event_handler(
            FnEventHandler::new(move |event| {
                if let AgentEvent::Nudge { message, .. } = event {
                    sink.lock().unwrap().push(message.to_string());
                }
            }),
        );

        let mut actions = Vec::new();
        for i in 0..3 {
            let record = agent.process_window(window(i, &[("Video", 300)])).await;
            actions.push(record.decision.action);
        }

        assert_eq!(actions, vec![Action::Observe, Action::Nudge, Action::Observe]);
        assert_eq!(nudges.lock().unwrap().len(), 1);
        assert_eq!(agent.store().timeline_len(), 3);
        assert_eq!(agent.store().stats().nudges_emitted, 1);
    }

    #[tokio::test]
    async fn low_confidence_never_nudges() {
        let mut agent = agent(
            AgentConfig::default()
                .with_goals(["coding"])
                .with_nudge_threshold(0.95),
        );
        for i in 0..6 {
            let record = agent
                .process_window(window(i, &[("Video", 270), ("IDE", 30)]))
                .await;
            assert_eq!(record.decision.action, Action::Observe);
            assert!(record.decision.nudge_message.is_none());
        }
        assert_eq!(agent.store().stats().nudges_emitted, 0);
    }

    #[tokio::test]
    async fn idle_window_is_unknown() {
        let mut agent = agent(AgentConfig::default());
        let record = agent.process_window(window(0, &[])).await;
        assert_eq!(record.decision.intent, Intent::Unknown);
        assert_eq!(record.decision.action, Action::Observe);
        assert_eq!(record.focus_context, "No activity observed");
    }

    #[tokio::test(start_paused = true)]
    async fn run_records_windows_and_stops_on_cancel() {
        let config = AgentConfig::default().with_window_length(Duration::from_secs(60));
        let store = AgentStateStore::default();
        let agent = Agent::new(config, store.clone()).unwrap();
        let builder = agent.builder();
        builder.ingest(ActivitySample::new("Terminal", "cargo", builder.period_start()));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(agent.run(cancel.clone()));

        for _ in 0..=180 {
            if store.timeline_len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert!(store.timeline_len() >= 2, "timeline_len={}", store.timeline_len());
        assert_eq!(store.stats().windows_skipped, 0);

        // Paused time runs ahead of the wall clock; windows still end at it.
        let latest = store.latest_decision().unwrap();
        assert!(latest.decision.timestamp <= Utc::now());

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(store.get().status, AgentStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_in_flight_decision() {
        let config = AgentConfig::default()
            .with_goals(["coding"])
            .with_window_length(Duration::from_secs(60))
            .with_oracle_timeout(Duration::from_secs(3600));
        let store = AgentStateStore::default();
        let stopped = Arc::new(Mutex::new(None));
        let sink = stopped.clone();
        let agent = Agent::new(config, store.clone())
            .unwrap()
            .with_oracle(Arc::new(SlowOracle))
            .with_event_handler(FnEventHandler::new(move |event| {
                if let AgentEvent::Stopped { dropped_in_flight } = event {
                    *sink.lock().unwrap() = Some(*dropped_in_flight);
                }
            }));
        let builder = agent.builder();
        // Unrecognised apps always go to the oracle.
        builder.ingest(ActivitySample::new("Zzyzx", "", builder.period_start()));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(agent.run(cancel.clone()));

        for _ in 0..120 {
            if store.stats().oracle_calls > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(store.stats().oracle_calls, 1);

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(store.timeline_len(), 0);
        assert_eq!(store.get().status, AgentStatus::Stopped);
        assert_eq!(*stopped.lock().unwrap(), Some(true));
    }
}
