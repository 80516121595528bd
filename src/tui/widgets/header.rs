use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::config::Theme;
use crate::tui::widgets::color::parse_color;

pub const APP_TITLE: &str = "TaskFlow";
pub const APP_TAGLINE: &str = "Organize Your Work";

pub struct HeaderView<'a> {
    pub backend: &'a str,
    pub dark: bool,
    pub loading: bool,
    pub submitting: bool,
}

/// Branding on the left, session state on the right
pub fn render_header(f: &mut Frame, area: Rect, view: &HeaderView, theme: &Theme) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let accent = parse_color(&theme.accent);
    let base = Style::default().fg(fg_color).bg(bg_color);

    let block = Block::default().borders(Borders::ALL).style(base);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(40)])
        .split(inner);

    let brand = Line::from(vec![
        Span::styled("✓ ", Style::default().fg(accent)),
        Span::styled(APP_TITLE, Style::default().fg(accent).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", APP_TAGLINE), base.add_modifier(Modifier::DIM)),
    ]);
    f.render_widget(Paragraph::new(brand), columns[0]);

    let activity = if view.submitting {
        "saving… "
    } else if view.loading {
        "loading… "
    } else {
        ""
    };
    let theme_icon = if view.dark { "☾ dark" } else { "☀ light" };
    let session = Line::from(vec![
        Span::styled(activity, Style::default().fg(accent)),
        Span::styled(format!("{} ", view.backend), base.add_modifier(Modifier::DIM)),
        Span::styled(format!("[{}]", theme_icon), base),
    ]);
    f.render_widget(Paragraph::new(session).alignment(Alignment::Right), columns[1]);
}
