//! Character-budget helpers.

/// Keep the first `max_chars` characters of `text`, appending `marker` when
/// anything was cut. Returns the text and whether it was truncated.
pub fn truncate_with_marker(text: &str, max_chars: usize, marker: &str) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text.to_string(), false),
        Some((idx, _)) => {
            let mut out = String::with_capacity(idx + marker.len());
            out.push_str(&text[..idx]);
            out.push_str(marker);
            (out, true)
        }
    }
}

/// Lowercase ASCII slug of at most `max_len` characters: runs of other
/// characters collapse to one `-`. Empty input yields `"query"`.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
            if slug.len() >= max_len {
                break;
            }
        } else {
            pending_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "query".to_string()
    } else {
        slug
    }
}
