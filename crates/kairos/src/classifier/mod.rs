//! Local, deterministic intent classification.
//!
//! [`LocalClassifier`] maps an [`ActivitySummary`] and the user's goals to
//! an [`Intent`] and a confidence using nothing but the app breakdown and a
//! [`Vocabulary`]. It never touches the network, so it is always available
//! as the fallback path and as a pre-filter for oracle calls.
//!
//! Each app is placed in at most one category, checked in this order:
//!
//! 1. custom productive list
//! 2. custom unproductive list
//! 3. terms aligned with a stated goal (productive)
//! 4. distraction list (unproductive)
//! 5. general productive list
//! 6. neutral list
//!
//! Time in a neutral app is then split by window title: titles whose
//! productive or distraction keywords win move their seconds to that
//! category, so a browser on a video site counts as a distraction. Apps
//! matching none of the lists are left out. The winning category is the one
//! with the most attributed seconds; confidence is its share of all
//! classified seconds.

mod vocabulary;

pub use vocabulary::{AppTokens, Vocabulary};

use serde::{Deserialize, Serialize};

use crate::Intent;
use crate::activity::ActivitySummary;
use vocabulary::first_match;

/// Category an individual app falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Productive,
    Neutral,
    Unproductive,
}

impl Category {
    pub fn intent(self) -> Intent {
        match self {
            Self::Productive => Intent::Productive,
            Self::Neutral => Intent::Neutral,
            Self::Unproductive => Intent::Unproductive,
        }
    }
}

/// Outcome of local classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
    pub reasoning: String,
}

impl Classification {
    /// Confident enough that asking the oracle would add little.
    pub fn is_decisive(&self, threshold: f64) -> bool {
        self.intent != Intent::Unknown && self.confidence >= threshold
    }

    fn unknown(reasoning: impl Into<String>) -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    productive: f64,
    neutral: f64,
    unproductive: f64,
}

impl Tally {
    fn add(&mut self, category: Category, secs: f64) {
        match category {
            Category::Productive => self.productive += secs,
            Category::Neutral => self.neutral += secs,
            Category::Unproductive => self.unproductive += secs,
        }
    }
}

/// Heuristic classifier over a [`Vocabulary`] plus user-specific lists.
#[derive(Debug, Clone, Default)]
pub struct LocalClassifier {
    vocabulary: Vocabulary,
    custom_productive: Vec<String>,
    custom_unproductive: Vec<String>,
}

impl LocalClassifier {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            ..Default::default()
        }
    }

    /// Apps the user always considers productive.
    pub fn with_custom_productive<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_productive.extend(apps.into_iter().map(Into::into));
        self
    }

    /// Apps the user always considers a distraction.
    pub fn with_custom_unproductive<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_unproductive
            .extend(apps.into_iter().map(Into::into));
        self
    }

    /// Place a single app, returning its category and the rule that fired.
    pub fn categorize(&self, app: &str, goals: &[String]) -> Option<(Category, String)> {
        let tokens = AppTokens::new(app);

        if let Some(term) = first_match(&tokens, &self.custom_productive) {
            return Some((Category::Productive, format!("your productive list: {term}")));
        }
        if let Some(term) = first_match(&tokens, &self.custom_unproductive) {
            return Some((
                Category::Unproductive,
                format!("your distraction list: {term}"),
            ));
        }
        if let Some((goal, term)) = self.vocabulary.goal_match(&tokens, goals) {
            return Some((Category::Productive, format!("goal '{goal}': {term}")));
        }
        if let Some(term) = first_match(&tokens, &self.vocabulary.unproductive) {
            return Some((Category::Unproductive, format!("distraction: {term}")));
        }
        if let Some(term) = first_match(&tokens, &self.vocabulary.productive) {
            return Some((Category::Productive, format!("productive: {term}")));
        }
        if let Some(term) = first_match(&tokens, &self.vocabulary.neutral) {
            return Some((Category::Neutral, format!("neutral: {term}")));
        }
        None
    }

    /// Classify a whole window.
    pub fn classify(&self, summary: &ActivitySummary, goals: &[String]) -> Classification {
        if summary.total_duration_seconds <= 0.0 || summary.app_breakdown.is_empty() {
            return Classification::unknown("No activity recorded in this window.");
        }

        let mut tally = Tally::default();
        let mut notes = Vec::new();
        let mut unmatched = Vec::new();

        for (app, secs) in summary.apps_by_time() {
            let Some((category, rule)) = self.categorize(app, goals) else {
                unmatched.push(app);
                continue;
            };
            let mut note = format!("{app} {:.0}s → {} ({rule})", secs, category.intent());
            let mut remaining = secs;
            if category == Category::Neutral {
                for (title, title_secs) in summary.title_breakdown.get(app).into_iter().flatten() {
                    let Some((refined, hits)) = self.vocabulary.title_verdict(title) else {
                        continue;
                    };
                    let moved = title_secs.min(remaining);
                    remaining -= moved;
                    tally.add(refined, moved);
                    note.push_str(&format!(
                        "; title \"{title}\" {moved:.0}s → {} (keywords: {})",
                        refined.intent(),
                        hits.join(", ")
                    ));
                }
            }
            tally.add(category, remaining);
            notes.push(note);
        }

        let Tally {
            productive,
            neutral,
            unproductive,
        } = tally;
        let classified = productive + neutral + unproductive;
        if notes.is_empty() {
            return Classification::unknown(format!(
                "None of the observed apps matched the vocabulary ({}).",
                unmatched.join(", ")
            ));
        }
        if classified <= 0.0 {
            return Classification::unknown("Matched apps had no attributed time.");
        }

        // Ties resolve in this order.
        let ranked = [
            (Category::Productive, productive),
            (Category::Neutral, neutral),
            (Category::Unproductive, unproductive),
        ];
        let (winner, weight) = ranked
            .into_iter()
            .fold((Category::Productive, f64::MIN), |best, candidate| {
                if candidate.1 > best.1 { candidate } else { best }
            });

        let confidence = (weight / classified).clamp(0.0, 1.0);
        let mut reasoning = format!(
            "Local heuristics: {:.0}s productive, {:.0}s neutral, {:.0}s unproductive; \
             {:.0}% {}. {}",
            productive,
            neutral,
            unproductive,
            confidence * 100.0,
            winner.intent(),
            notes.join("; ")
        );
        if !unmatched.is_empty() {
            reasoning.push_str(&format!("; unmatched: {}", unmatched.join(", ")));
        }
        reasoning.push('.');

        Classification {
            intent: winner.intent(),
            confidence,
            reasoning,
        }
    }
}
