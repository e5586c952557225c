//! Formatted output helpers for CLI commands.

/// Truncates a sandbox id for tabular display.
#[must_use]
pub fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}

/// Renders an ISO-8601 creation timestamp as a rough age. Unparseable
/// timestamps come back verbatim.
#[must_use]
pub fn format_age(created_at: &str) -> String {
    let Ok(created) = chrono::DateTime::parse_from_rfc3339(created_at) else {
        return created_at.to_string();
    };
    let elapsed = chrono::Utc::now().signed_duration_since(created);

    if elapsed.num_days() > 0 {
        format!("{}d ago", elapsed.num_days())
    } else if elapsed.num_hours() > 0 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_minutes() > 0 {
        format!("{}m ago", elapsed.num_minutes())
    } else {
        "just now".to_string()
    }
}
