use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::config::Theme;
use crate::models::TaskStats;
use crate::tui::widgets::color::parse_color;

/// Four counters over the whole collection
pub fn render_stats_panel(f: &mut Frame, area: Rect, stats: &TaskStats, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let base = Style::default().fg(fg_color).bg(bg_color);

    let cards = [
        ("Total", stats.total, parse_color(&theme.accent)),
        ("Completed", stats.completed, Color::Green),
        ("Pending", stats.pending, Color::Yellow),
        ("Overdue", stats.overdue, Color::LightRed),
    ];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    for ((label, value, color), column) in cards.into_iter().zip(columns.iter()) {
        let line = Line::from(vec![
            Span::styled(format!("{} ", value), Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(label, base),
        ]);
        let paragraph = Paragraph::new(line)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).style(base));
        f.render_widget(paragraph, *column);
    }
}
