use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::config::Theme;
use crate::models::TaskFilter;
use crate::tui::widgets::color::parse_color;

pub const SEARCH_PLACEHOLDER: &str = "Search tasks...";

/// Search box plus the filter selector
pub fn render_toolbar(
    f: &mut Frame,
    area: Rect,
    search: &str,
    search_active: bool,
    filter: TaskFilter,
    theme: &Theme,
) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let accent = parse_color(&theme.accent);
    let base = Style::default().fg(fg_color).bg(bg_color);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let search_line = if search.is_empty() && !search_active {
        Line::from(Span::styled(SEARCH_PLACEHOLDER, base.add_modifier(Modifier::DIM)))
    } else {
        Line::from(Span::styled(search.to_string(), base))
    };
    let search_block = Block::default()
        .borders(Borders::ALL)
        .title("Search")
        .border_style(if search_active { Style::default().fg(accent) } else { base })
        .style(base);
    let search_area = columns[0];
    f.render_widget(Paragraph::new(search_line).block(search_block), search_area);
    if search_active {
        let width = search_area.width.saturating_sub(2);
        let col = (search.chars().count() as u16).min(width.saturating_sub(1));
        f.set_cursor_position((search_area.x + 1 + col, search_area.y + 1));
    }

    let mut spans = Vec::new();
    for (idx, option) in TaskFilter::ALL.iter().enumerate() {
        let style = if *option == filter {
            Style::default().fg(accent).add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            base
        };
        spans.push(Span::styled(format!("{}:{}", idx + 1, option.label()), style));
        spans.push(Span::raw(" "));
    }
    let filter_paragraph = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Filter").style(base));
    f.render_widget(filter_paragraph, columns[1]);
}
