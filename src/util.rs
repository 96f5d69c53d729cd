use std::time::Duration;

/// Formats a duration as `m:ss`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Whole percentage for display.
pub fn percent(value: f64) -> String {
    format!("{}%", value.round() as i64)
}
