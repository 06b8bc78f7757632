//! String utilities for the domain layer.

/// Truncate `s` to at most `max_chars` characters, appending `...` when cut.
///
/// Counts characters rather than bytes so CJK text is not cut three times
/// shorter than ASCII text.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
