//! App-name normalization and window-title sanitization.
//!
//! Titles are the only free text the agent sees, so they are scrubbed before
//! they reach a summary: email addresses are masked, absolute paths are cut
//! down to the file name, and the result is capped in length.

/// Maximum characters kept from a window title.
pub const MAX_TITLE_CHARS: usize = 100;

/// Process names mapped to the names people actually recognise.
const FRIENDLY_APP_NAMES: &[(&str, &str)] = &[
    ("Taskmgr", "Task Manager"),
    ("explorer", "File Explorer"),
    ("ApplicationFrameHost", "Windows App"),
    ("SystemSettings", "Windows Settings"),
    ("SearchHost", "Windows Search"),
    ("StartMenuExperienceHost", "Start Menu"),
    ("WindowsTerminal", "Windows Terminal"),
    ("cmd", "Command Prompt"),
    ("powershell", "PowerShell"),
    ("pwsh", "PowerShell"),
    ("Code", "Visual Studio Code"),
    ("devenv", "Visual Studio"),
    ("chrome", "Google Chrome"),
    ("msedge", "Microsoft Edge"),
    ("firefox", "Firefox"),
    ("OUTLOOK", "Outlook"),
    ("WINWORD", "Microsoft Word"),
    ("EXCEL", "Microsoft Excel"),
    ("POWERPNT", "PowerPoint"),
    ("notepad", "Notepad"),
    ("mspaint", "Paint"),
    ("SnippingTool", "Snipping Tool"),
    ("Spotify", "Spotify"),
    ("Discord", "Discord"),
    ("Slack", "Slack"),
    ("Teams", "Microsoft Teams"),
    ("ms-teams", "Microsoft Teams"),
];

/// Normalize a raw process or app name.
///
/// Trims whitespace, drops a trailing `.exe`, and maps well-known process
/// names to friendly ones. Unknown names pass through unchanged.
pub fn normalize_app_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let base = match trimmed.len().checked_sub(4) {
        Some(cut)
            if cut > 0
                && trimmed.is_char_boundary(cut)
                && trimmed.get(cut..).is_some_and(|ext| ext.eq_ignore_ascii_case(".exe")) =>
        {
            trimmed.get(..cut).unwrap_or(trimmed)
        }
        _ => trimmed,
    };

    FRIENDLY_APP_NAMES
        .iter()
        .find(|(process, _)| *process == base)
        .or_else(|| {
            FRIENDLY_APP_NAMES
                .iter()
                .find(|(process, _)| process.eq_ignore_ascii_case(base))
        })
        .map(|(_, friendly)| (*friendly).to_string())
        .unwrap_or_else(|| base.to_string())
}

/// Scrub a window title for inclusion in a summary.
pub fn sanitize_title(title: &str) -> String {
    let without_paths = strip_directories(title);
    let cleaned: Vec<String> = without_paths.split_whitespace().map(mask_email).collect();
    cleaned.join(" ").chars().take(MAX_TITLE_CHARS).collect()
}

fn mask_email(token: &str) -> String {
    if looks_like_email(token) {
        "[email]".to_string()
    } else {
        token.to_string()
    }
}

/// Remove the directory part of every absolute path in `title`.
///
/// A path runs from its root (`C:\`, `/` or `~/`) to the last separator of
/// the same kind anywhere after it, so directory names containing spaces
/// are removed whole.
fn strip_directories(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    let mut out = String::with_capacity(title.len());
    let mut i = 0;
    while i < chars.len() {
        match directory_len(&chars, i) {
            Some(len) => i += len,
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }
    out
}

/// Length of the directory prefix of a path starting at `start`, if any.
fn directory_len(chars: &[char], start: usize) -> Option<usize> {
    let at_boundary = start == 0
        || chars
            .get(start - 1)
            .is_some_and(|c| c.is_whitespace() || matches!(*c, '"' | '\'' | '(' | '['));
    if !at_boundary {
        return None;
    }

    let rest = chars.get(start..)?;
    let (separator, root_len, min_separators) = match rest {
        [letter, ':', sep @ ('\\' | '/'), ..] if letter.is_ascii_alphabetic() => (*sep, 3, 1),
        ['~', '/', ..] => ('/', 2, 2),
        ['/', next, ..] if *next != '/' => ('/', 1, 2),
        _ => return None,
    };

    let separators = rest.iter().filter(|c| **c == separator).count();
    if separators < min_separators {
        return None;
    }
    let last = rest.iter().rposition(|c| *c == separator)?;
    Some((last + 1).max(root_len))
}

fn looks_like_email(token: &str) -> bool {
    match token.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.contains('@')
        }
        None => false,
    }
}
