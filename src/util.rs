// src/util.rs — Shared utility functions

/// One-line preview of `s`: whitespace runs collapsed, cut at `max_chars`
/// characters with a trailing "..." when shortened.
pub fn preview(s: &str, max_chars: usize) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}
