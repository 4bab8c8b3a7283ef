//! App vocabulary used by the local classifier.
//!
//! Terms are matched on lowercase alphanumeric tokens rather than raw
//! substrings: `"ide"` matches `"JetBrains IDE"` but not `"Video"`, and
//! `"windowsterminal"` matches `"Windows Terminal"` through the joined form.
//! Title keywords starting with `.` are file extensions and match the end of
//! a word instead.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Category;

const PRODUCTIVE_APPS: &[&str] = &[
    "code",
    "vscode",
    "visual studio",
    "pycharm",
    "intellij",
    "sublime text",
    "vim",
    "neovim",
    "emacs",
    "terminal",
    "windowsterminal",
    "powershell",
    "command prompt",
    "microsoft word",
    "microsoft excel",
    "powerpoint",
    "notion",
    "obsidian",
    "figma",
    "postman",
    "datagrip",
    "dbeaver",
];

const DISTRACTION_APPS: &[&str] = &[
    "spotify",
    "netflix",
    "youtube",
    "video",
    "twitch",
    "discord",
    "steam",
    "epic games",
    "battle net",
    "twitter",
    "facebook",
    "instagram",
    "tiktok",
    "reddit",
];

const NEUTRAL_APPS: &[&str] = &[
    "file explorer",
    "finder",
    "settings",
    "windows settings",
    "google chrome",
    "chrome",
    "firefox",
    "microsoft edge",
    "safari",
    "brave",
    "slack",
    "microsoft teams",
    "zoom",
    "outlook",
];

const PRODUCTIVE_TITLE_KEYWORDS: &[&str] = &[
    "github",
    "gitlab",
    "stackoverflow",
    "stack overflow",
    "documentation",
    "api",
    "docs",
    "tutorial",
    "learning",
    "course",
    "jira",
    "trello",
    "asana",
    "linear",
    "notion",
    "pull request",
    "merge",
    "commit",
    "branch",
    ".py",
    ".js",
    ".ts",
    ".java",
    ".go",
    ".rs",
];

const DISTRACTION_TITLE_KEYWORDS: &[&str] = &[
    "youtube",
    "netflix",
    "twitch",
    "reddit",
    "twitter",
    "facebook",
    "instagram",
    "tiktok",
    "game",
    "games",
    "play",
    "watch",
    "stream",
    "meme",
    "memes",
    "funny",
    "viral",
    "trending",
];

const GOAL_TERMS: &[(&str, &[&str])] = &[
    (
        "coding",
        &[
            "ide", "code", "vscode", "visual studio", "terminal", "vim", "neovim", "emacs",
            "intellij", "pycharm", "github", "postman",
        ],
    ),
    (
        "learning",
        &["anki", "coursera", "udemy", "kindle", "obsidian", "notion"],
    ),
    (
        "writing",
        &["microsoft word", "google docs", "obsidian", "notion", "scrivener", "notepad"],
    ),
    ("design", &["figma", "sketch", "photoshop", "illustrator"]),
];

/// Allow, deny, and neutral term lists plus goal-specific productive terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Apps that count as productive regardless of goals.
    pub productive: Vec<String>,
    /// Apps that count as distractions.
    pub unproductive: Vec<String>,
    /// Apps that are neither. Their time is refined by window title.
    pub neutral: Vec<String>,
    /// Title keywords that mark work inside a neutral app.
    pub productive_title_keywords: Vec<String>,
    /// Title keywords that mark a distraction inside a neutral app.
    pub distraction_title_keywords: Vec<String>,
    /// Goal name (lowercase) to extra productive terms.
    pub goal_terms: BTreeMap<String, Vec<String>>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let owned = |terms: &[&str]| terms.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        Self {
            productive: owned(PRODUCTIVE_APPS),
            unproductive: owned(DISTRACTION_APPS),
            neutral: owned(NEUTRAL_APPS),
            productive_title_keywords: owned(PRODUCTIVE_TITLE_KEYWORDS),
            distraction_title_keywords: owned(DISTRACTION_TITLE_KEYWORDS),
            goal_terms: GOAL_TERMS
                .iter()
                .map(|(goal, terms)| (goal.to_string(), owned(terms)))
                .collect(),
        }
    }
}

impl Vocabulary {
    /// The first goal-aligned term matching `app`, with its goal.
    pub fn goal_match<'a>(&'a self, app: &AppTokens, goals: &[String]) -> Option<(&'a str, &'a str)> {
        goals.iter().find_map(|goal| {
            let (goal, terms) = self.goal_terms.get_key_value(&goal.trim().to_lowercase())?;
            terms
                .iter()
                .find(|term| app.matches(term))
                .map(|term| (goal.as_str(), term.as_str()))
        })
    }

    /// Judge a window title by keyword hits. The side with more hits wins;
    /// a tie (including no hits at all) gives `None`.
    pub fn title_verdict<'a>(&'a self, title: &str) -> Option<(Category, Vec<&'a str>)> {
        let tokens = AppTokens::new(title);
        let productive = keyword_hits(title, &tokens, &self.productive_title_keywords);
        let distraction = keyword_hits(title, &tokens, &self.distraction_title_keywords);
        match productive.len().cmp(&distraction.len()) {
            Ordering::Greater => Some((Category::Productive, productive)),
            Ordering::Less => Some((Category::Unproductive, distraction)),
            Ordering::Equal => None,
        }
    }
}

fn keyword_hits<'a>(title: &str, tokens: &AppTokens, keywords: &'a [String]) -> Vec<&'a str> {
    keywords
        .iter()
        .filter(|keyword| {
            if keyword.starts_with('.') {
                has_extension(title, keyword)
            } else {
                tokens.matches(keyword)
            }
        })
        .map(String::as_str)
        .collect()
}

fn has_extension(title: &str, extension: &str) -> bool {
    let extension = extension.to_lowercase();
    title.split_whitespace().any(|word| {
        let word = word
            .trim_end_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        word.len() > extension.len() && word.ends_with(&extension)
    })
}

/// First term in `terms` that matches `app`.
pub fn first_match<'a>(app: &AppTokens, terms: &'a [String]) -> Option<&'a str> {
    terms
        .iter()
        .find(|term| app.matches(term))
        .map(String::as_str)
}

/// An app name (or window title) broken into lowercase alphanumeric tokens.
#[derive(Debug, Clone)]
pub struct AppTokens {
    tokens: Vec<String>,
    joined: String,
}

impl AppTokens {
    pub fn new(app: &str) -> Self {
        let tokens = tokenize(app);
        let joined = tokens.concat();
        Self { tokens, joined }
    }

    /// Whether `term` appears as a contiguous token run, or equals the
    /// app's joined tokens.
    pub fn matches(&self, term: &str) -> bool {
        let needle = tokenize(term);
        if needle.is_empty() {
            return false;
        }
        if needle.concat() == self.joined {
            return true;
        }
        self.tokens
            .windows(needle.len())
            .any(|window| window == needle.as_slice())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
