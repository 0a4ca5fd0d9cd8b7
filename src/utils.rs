/// Normalize a display name for matching: lowercase, trim, collapse
/// internal whitespace runs to single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Format a list of labels for display, truncated past a limit.
pub fn format_labels(labels: &[String], limit: usize) -> String {
    if labels.len() <= limit {
        labels.join(", ")
    } else {
        format!(
            "{} and {} more",
            labels[..limit].join(", "),
            labels.len() - limit
        )
    }
}
