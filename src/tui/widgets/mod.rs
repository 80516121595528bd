pub mod color;
pub mod confirm_delete;
pub mod editor;
pub mod form;
pub mod header;
pub mod help;
pub mod not_found;
pub mod stats_panel;
pub mod status_bar;
pub mod task_list;
pub mod toolbar;

use ratatui::layout::{Constraint, Flex, Layout, Rect};

/// Centered rect using a percentage of the available area
/// Based on ratatui popup example: https://ratatui.rs/examples/apps/popup/
pub fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

/// Truncate to `max` characters, marking the cut with "..."
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_is_centered() {
        let area = popup_area(Rect::new(0, 0, 100, 50), 50, 40);
        assert_eq!(area, Rect::new(25, 15, 50, 20));
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 8), "a lon...");
    }
}
