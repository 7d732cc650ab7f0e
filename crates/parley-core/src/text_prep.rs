//! Turns a model reply into text suitable for speech synthesis.
//!
//! The reply stored in history is never modified; only the copy sent to the
//! synthesis backend goes through [`spoken_text`].

use regex::Regex;
use std::sync::LazyLock;

/// Upper bound on characters sent to the synthesis backend per turn.
pub const MAX_SPOKEN_CHARS: usize = 5_000;

static RE_CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static RE_INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").unwrap());
// Emphasis needs a matching closer with no whitespace just inside the markers.
// Underscores also need non-word characters outside, so snake_case survives.
static RE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^\s*](?:[^*\n]*[^\s*])?)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^\s*](?:[^*\n]*[^\s*])?)\*").unwrap());
static RE_BOLD_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\W)__([^\s_](?:[^_\n]*[^\s_])?)__(\W|$)").unwrap());
static RE_ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|\W)_([^\s_](?:[^_\n]*[^\s_])?)_(\W|$)").unwrap());
static RE_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*#{1,6}\s+").unwrap());
static RE_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip markdown markup, collapse whitespace, and cap the length at
/// [`MAX_SPOKEN_CHARS`] on a sentence boundary where possible.
pub fn spoken_text(reply: &str) -> String {
    let mut t = RE_CODE_BLOCK.replace_all(reply, " ").into_owned();
    t = RE_INLINE_CODE.replace_all(&t, "$1").into_owned();
    t = RE_BOLD.replace_all(&t, "$1").into_owned();
    t = RE_ITALIC.replace_all(&t, "$1").into_owned();
    t = RE_BOLD_UNDERSCORE.replace_all(&t, "${1}${2}${3}").into_owned();
    t = RE_ITALIC_UNDERSCORE.replace_all(&t, "${1}${2}${3}").into_owned();
    t = RE_HEADING.replace_all(&t, "").into_owned();
    t = RE_LINK.replace_all(&t, "$1").into_owned();
    t = RE_WHITESPACE.replace_all(&t, " ").into_owned();
    truncate_at_sentence(t.trim(), MAX_SPOKEN_CHARS)
}

/// Keep at most `max_chars` characters, cutting after the last `.`, `!` or
/// `?` inside the limit. Falls back to the last space, then a hard cut.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    let end = head
        .rfind(['.', '!', '?'])
        .map(|i| i + 1)
        .or_else(|| head.rfind(' '))
        .unwrap_or(head.len());
    head[..end].trim_end().to_string()
}
