use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::config::Theme;
use crate::tui::widgets::color::parse_color;

pub const NOT_FOUND_TITLE: &str = "Page Not Found";
pub const NOT_FOUND_MESSAGE: &str = "The page you're looking for doesn't exist or has been moved.";
pub const BACK_LABEL: &str = "Back to TaskFlow";

/// Fallback screen for unknown routes
pub fn render_not_found(f: &mut Frame, area: Rect, path: &str, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let accent = parse_color(&theme.accent);
    let base = Style::default().fg(fg_color).bg(bg_color);

    let top_padding = area.height.saturating_sub(10) / 2;
    let mut lines: Vec<Line> = (0..top_padding).map(|_| Line::from("")).collect();
    lines.extend([
        Line::from(Span::styled("404", Style::default().fg(accent).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(NOT_FOUND_TITLE, base.add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(NOT_FOUND_MESSAGE, base)),
        Line::from(Span::styled(path.to_string(), base.add_modifier(Modifier::DIM))),
        Line::from(""),
        Line::from(Span::styled(
            format!("[ Enter ] {}", BACK_LABEL),
            Style::default().fg(accent).add_modifier(Modifier::REVERSED),
        )),
    ]);

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).style(base))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}
