//! Text helpers for log output.

/// Truncate `s` to at most `max_chars` characters, respecting char boundaries.
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
