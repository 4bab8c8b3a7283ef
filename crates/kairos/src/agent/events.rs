//! Events and handlers for the [`Agent`](super::Agent) loop.
//!
//! The agent reports what it is doing through [`AgentEvent`] variants, from
//! a window closing through classification and the oracle call to the
//! final recorded decision. Callers implement [`EventHandler`] to surface
//! nudges to the user, log, or count.
//!
//! # Choosing an event handler
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests, or runs where only the state store matters |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures, e.g. printing nudges to a terminal |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::DecisionRecord;
use crate::KairosError;
use crate::activity::ActivitySummary;
use crate::classifier::Classification;
use crate::policy::Suppression;
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the agent while it runs.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A window closed and was summarized.
    WindowClosed { summary: &'a ActivitySummary },
    /// The local classifier produced its reading of the window.
    Classified { classification: &'a Classification },
    /// The classifier was decisive enough that the oracle was not called.
    OracleSkipped { confidence: f64 },
    /// The oracle failed or timed out; the fallback decision is used.
    OracleFailed { error: &'a KairosError },
    /// A candidate nudge was downgraded to observe.
    NudgeSuppressed { reason: Suppression },
    /// A nudge passed the policy and should be shown to the user.
    Nudge {
        message: &'a str,
        record: &'a DecisionRecord,
    },
    /// A decision was written to the state store.
    DecisionRecorded { record: &'a DecisionRecord },
    /// Windows closed while a decision was still in flight and were
    /// replaced by a newer one.
    WindowsSkipped { count: u64 },
    /// The loop stopped. `dropped_in_flight` is true if a decision was
    /// abandoned mid-call.
    Stopped { dropped_in_flight: bool },
}

/// Trait for observing agent events.
///
/// All methods have no-op defaults. Handlers run inline on the decision
/// path, so they should be quick.
///
/// # Example
///
/// ```ignore
/// struct NudgePrinter;
///
/// impl EventHandler for NudgePrinter {
///     fn on_event(&self, event: &AgentEvent<'_>) {
///         if let AgentEvent::Nudge { message, .. } = event {
///             println!("{message}");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event.
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let AgentEvent::Nudge { message, .. } = event {
///         println!("{message}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler, in insertion order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with_if(console, nudge_printer);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Add a handler only when `condition` holds.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    /// Add a handler if present.
    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::WindowClosed { summary } => {
                debug!(
                    "Window {} → {}: {} sample(s), {}",
                    summary.period_start.format("%H:%M:%S"),
                    summary.period_end.format("%H:%M:%S"),
                    summary.sample_count,
                    summary.focus_context()
                );
            }
            AgentEvent::Classified { classification } => {
                debug!(
                    "Classified as {} ({:.2}): {}",
                    classification.intent, classification.confidence, classification.reasoning
                );
            }
            AgentEvent::OracleSkipped { confidence } => {
                trace!("Local confidence {confidence:.2} is decisive; oracle skipped");
            }
            AgentEvent::OracleFailed { error } => {
                warn!("Using fallback decision: {error}");
            }
            AgentEvent::NudgeSuppressed { reason } => {
                info!("Nudge suppressed: {reason}");
            }
            AgentEvent::Nudge { message, .. } => {
                info!("Nudge: {message}");
            }
            AgentEvent::DecisionRecorded { record } => {
                info!(
                    "[{}] {} {} ({:.2}) via {:?}",
                    record.decision.timestamp.format("%H:%M:%S"),
                    record.decision.action,
                    record.decision.intent,
                    record.decision.confidence,
                    record.source
                );
            }
            AgentEvent::WindowsSkipped { count } => {
                warn!("{count} window(s) skipped while a decision was in flight");
            }
            AgentEvent::Stopped { dropped_in_flight } => {
                if *dropped_in_flight {
                    info!("Agent stopped; in-flight decision dropped");
                } else {
                    info!("Agent stopped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);

    impl EventHandler for Counter {
        fn on_event(&self, _event: &AgentEvent<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn composite_dispatches_to_all() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let handler = CompositeEventHandler::new()
            .with(Counter(a.clone()))
            .with(LoggingHandler)
            .with(Counter(b.clone()));
        assert_eq!(handler.len(), 3);

        handler.on_event(&AgentEvent::WindowsSkipped { count: 2 });
        handler.on_event(&AgentEvent::Stopped {
            dropped_in_flight: false,
        });
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn with_if_and_with_opt() {
        let handler = CompositeEventHandler::new()
            .with_if(false, NoopHandler)
            .with_if(true, NoopHandler)
            .with_opt(None::<NoopHandler>)
            .with_opt(Some(NoopHandler));
        assert_eq!(handler.len(), 2);
        assert!(CompositeEventHandler::default().is_empty());
    }

    #[test]
    fn fn_handler_sees_events() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler = FnEventHandler::new(move |event| {
            if let AgentEvent::OracleSkipped { .. } = event {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        handler.on_event(&AgentEvent::OracleSkipped { confidence: 0.9 });
        handler.on_event(&AgentEvent::WindowsSkipped { count: 1 });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
