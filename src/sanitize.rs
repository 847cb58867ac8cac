//! Topic sanitization
//!
//! User topics are interpolated into prompts and stored in history, so
//! markup is stripped and the length is capped before either happens.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum topic length in characters
pub const MAX_TOPIC_CHARS: usize = 500;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Trim, strip `<...>` tags and cap at [`MAX_TOPIC_CHARS`] characters.
///
/// Returns `None` when nothing is left.
pub fn sanitize_topic(raw: &str) -> Option<String> {
    let stripped = TAG_RE.replace_all(raw.trim(), "");
    let capped: String = stripped.chars().take(MAX_TOPIC_CHARS).collect();
    let topic = capped.trim();

    if topic.is_empty() {
        None
    } else {
        Some(topic.to_string())
    }
}
