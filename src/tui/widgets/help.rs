use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::config::{KeyBindings, Theme};
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::popup_area;
use crate::utils::format_key_binding_for_display as key;

pub fn render_help(f: &mut Frame, area: Rect, bindings: &KeyBindings, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let base = Style::default().fg(fg_color).bg(bg_color);

    let popup_area = popup_area(area, 60, 70);
    f.render_widget(Clear, popup_area);

    let paragraph = Paragraph::new(build_help_text(bindings))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help - Key Bindings")
                .title_alignment(Alignment::Center)
                .style(base),
        )
        .style(base)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

fn build_help_text(kb: &KeyBindings) -> String {
    let mut text = String::new();

    text.push_str("Navigation:\n");
    text.push_str(&format!("  {} / {}: Move up/down\n", key(&kb.list_up), key(&kb.list_down)));
    text.push_str(&format!("  {} / {}: Next/previous filter\n", key(&kb.filter_next), key(&kb.filter_prev)));
    text.push_str("  1-6: Jump to filter\n");
    text.push_str(&format!("  {}: Search\n", key(&kb.search)));
    text.push('\n');

    text.push_str("Tasks:\n");
    text.push_str(&format!("  {}: New task\n", key(&kb.new)));
    text.push_str(&format!("  {}: Edit selected task\n", key(&kb.edit)));
    text.push_str(&format!("  {}: Toggle completed\n", key(&kb.toggle_status)));
    text.push_str(&format!("  {}: Delete selected task\n", key(&kb.delete)));
    text.push_str(&format!("  {}: Reload\n", key(&kb.reload)));
    text.push('\n');

    text.push_str("Form:\n");
    text.push_str("  Tab / Shift+Tab: Next/previous field\n");
    text.push_str("  ← / →: Change priority or status\n");
    text.push_str(&format!("  {}: Save\n", key(&kb.save)));
    text.push_str("  Esc: Cancel\n");
    text.push('\n');

    text.push_str("General:\n");
    text.push_str(&format!("  {}: Toggle light/dark theme\n", key(&kb.toggle_theme)));
    text.push_str(&format!("  {}: Help\n", key(&kb.help)));
    text.push_str(&format!("  {}: Quit\n", key(&kb.quit)));

    text
}
