//! The nudge policy: stateful filtering of candidate decisions.
//!
//! Every window yields one candidate [`Decision`]. The policy first updates
//! the intent streak, then applies these rules in order (first match wins):
//!
//! 1. confidence below `nudge_confidence_threshold` → observe
//! 2. inside the cooldown after the last nudge, or the hourly cap is
//!    reached → observe
//! 3. intent is not unproductive, or the streak is shorter than
//!    `consecutive_intent_threshold` → observe
//! 4. otherwise the candidate's action stands; a nudge starts a new
//!    cooldown and resets the streak
//!
//! Time comes from `decision.timestamp`, never the wall clock, so the same
//! sequence of candidates always yields the same sequence of outcomes.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::{Action, Decision, Intent};

/// Tunables for [`NudgePolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub nudge_confidence_threshold: f64,
    pub cooldown_period: Duration,
    pub consecutive_intent_threshold: u32,
    /// Nudges allowed in any trailing hour. `0` disables the cap.
    pub max_nudges_per_hour: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            nudge_confidence_threshold: 0.6,
            cooldown_period: Duration::from_secs(15 * 60),
            consecutive_intent_threshold: 2,
            max_nudges_per_hour: 3,
        }
    }
}

/// Why a candidate's action was downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    LowConfidence,
    Cooldown,
    HourlyCap,
    NotSustained,
    MissingMessage,
}

impl fmt::Display for Suppression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::LowConfidence => "confidence below threshold",
            Self::Cooldown => "cooldown active",
            Self::HourlyCap => "hourly nudge limit reached",
            Self::NotSustained => "deviation not yet sustained",
            Self::MissingMessage => "nudge had no message",
        };
        f.write_str(text)
    }
}

/// Result of running one candidate through the policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    /// The decision as the user sees it.
    pub decision: Decision,
    /// Set when the candidate was a nudge and got downgraded.
    pub suppressed: Option<Suppression>,
    /// Streak length after this candidate.
    pub streak: u32,
}

#[derive(Debug, Default)]
struct CooldownState {
    last_nudge: Option<DateTime<Utc>>,
    suppressed_until: Option<DateTime<Utc>>,
    last_intent: Option<Intent>,
    consecutive_same_intent_count: u32,
    recent_nudges: VecDeque<DateTime<Utc>>,
}

/// Stateful nudge filter. Owned by the agent loop; not shared.
#[derive(Debug)]
pub struct NudgePolicy {
    config: PolicyConfig,
    cooldown: TimeDelta,
    state: CooldownState,
}

impl NudgePolicy {
    pub fn new(config: PolicyConfig) -> Self {
        let cooldown = TimeDelta::from_std(config.cooldown_period).unwrap_or(TimeDelta::MAX);
        Self {
            config,
            cooldown,
            state: CooldownState::default(),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Current streak of identical intents.
    pub fn streak(&self) -> u32 {
        self.state.consecutive_same_intent_count
    }

    /// Run one candidate through the rules.
    pub fn apply(&mut self, candidate: Decision) -> PolicyOutcome {
        let now = candidate.timestamp;
        self.observe_intent(candidate.intent);
        self.expire_recent(now);

        let streak = self.state.consecutive_same_intent_count;
        let verdict = self.evaluate(&candidate, now, streak);

        let mut decision = candidate;
        let suppressed = match verdict {
            None if decision.action == Action::Nudge => {
                self.record_nudge(now);
                None
            }
            None => None,
            Some(reason) => {
                let was_nudge = decision.action == Action::Nudge;
                decision.action = Action::Observe;
                if was_nudge {
                    decision.reasoning = format!("{} [nudge suppressed: {reason}]", decision.reasoning);
                    debug!("Nudge suppressed: {reason}");
                    Some(reason)
                } else {
                    None
                }
            }
        };
        if decision.action == Action::Observe {
            decision.nudge_message = None;
        }

        PolicyOutcome {
            decision,
            suppressed,
            streak: self.state.consecutive_same_intent_count,
        }
    }

    fn observe_intent(&mut self, intent: Intent) {
        if self.state.last_intent == Some(intent) {
            self.state.consecutive_same_intent_count += 1;
        } else {
            self.state.consecutive_same_intent_count = 1;
        }
        self.state.last_intent = Some(intent);
    }

    fn expire_recent(&mut self, now: DateTime<Utc>) {
        let hour_ago = now - TimeDelta::hours(1);
        while self
            .state
            .recent_nudges
            .front()
            .is_some_and(|t| *t <= hour_ago)
        {
            self.state.recent_nudges.pop_front();
        }
    }

    fn evaluate(&self, candidate: &Decision, now: DateTime<Utc>, streak: u32) -> Option<Suppression> {
        if candidate.confidence < self.config.nudge_confidence_threshold {
            return Some(Suppression::LowConfidence);
        }
        if self.state.suppressed_until.is_some_and(|until| now < until) {
            return Some(Suppression::Cooldown);
        }
        if self.config.max_nudges_per_hour > 0
            && self.state.recent_nudges.len() >= self.config.max_nudges_per_hour as usize
        {
            return Some(Suppression::HourlyCap);
        }
        if candidate.intent != Intent::Unproductive
            || streak < self.config.consecutive_intent_threshold
        {
            return Some(Suppression::NotSustained);
        }
        if candidate.action == Action::Nudge
            && candidate
                .nudge_message
                .as_deref()
                .is_none_or(|m| m.trim().is_empty())
        {
            return Some(Suppression::MissingMessage);
        }
        None
    }

    fn record_nudge(&mut self, now: DateTime<Utc>) {
        self.state.last_nudge = Some(now);
        self.state.suppressed_until = now.checked_add_signed(self.cooldown).or(Some(DateTime::<Utc>::MAX_UTC));
        self.state.consecutive_same_intent_count = 0;
        self.state.recent_nudges.push_back(now);
        debug!(
            "Nudge accepted; cooldown until {:?}",
            self.state.suppressed_until
        );
    }
}
