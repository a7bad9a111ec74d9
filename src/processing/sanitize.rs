//! Text normalization applied to job-record fields before they are assembled into documents.

use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z0-9+]*://\S+").expect("valid URL pattern")
});

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}\b")
        .expect("valid email pattern")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

static NON_SEMANTIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-.,/()]").expect("valid punctuation pattern"));

/// Clean a free-text field for embedding.
///
/// URLs and email addresses are removed first so that no fragments of them (a stray `@` or a
/// dangling domain) survive the later passes. Whitespace runs then collapse to a single space,
/// characters outside word characters, whitespace, and `- . , / ( )` are dropped, and the result
/// is trimmed. `None`, empty, and whitespace-only input all yield an empty string.
pub fn clean_text(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    if text.trim().is_empty() {
        return String::new();
    }

    let text = URL_PATTERN.replace_all(text, "");
    let text = EMAIL_PATTERN.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = NON_SEMANTIC.replace_all(&text, "");
    text.trim().to_string()
}
