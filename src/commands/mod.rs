pub mod assess;
pub mod bench;
pub mod eval;
pub mod index;
pub mod retrieve;

/// Truncate to `max` characters for terminal display
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
