//! Small text helpers shared by the report and log writers.

/// Truncates `text` to `max` characters, ending in `...` when clipped.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Returns `singular` for a count of one and `plural` otherwise.
pub fn plural<'a>(count: usize, singular: &'a str, plural: &'a str) -> &'a str {
    if count == 1 {
        singular
    } else {
        plural
    }
}

/// Formats a count with its noun, e.g. `1 file` or `3 files`.
pub fn count_noun(count: usize, singular: &str, plural_form: &str) -> String {
    format!("{count} {}", plural(count, singular, plural_form))
}
