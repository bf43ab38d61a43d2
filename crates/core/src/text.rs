use unicode_segmentation::UnicodeSegmentation;

pub fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps at most `max` user-perceived characters.
pub fn truncate_graphemes(input: &str, max: usize) -> String {
    input.graphemes(true).take(max).collect()
}
