use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};

use crate::config::Theme;
use crate::models::{Priority, Status};
use crate::tui::app::{FormEditors, FormField};
use crate::tui::widgets::color::{get_contrast_text_color, parse_color, priority_color, status_color};
use crate::tui::widgets::editor::Editor;
use crate::tui::widgets::popup_area;

/// First visible line so the cursor stays on screen
fn scroll_for(editor: &Editor, height: usize) -> usize {
    if height == 0 || editor.cursor_line < height {
        0
    } else {
        editor.cursor_line + 1 - height
    }
}

/// Horizontal offset keeping the cursor inside a single-line field
fn column_offset(editor: &Editor, width: usize) -> usize {
    if width == 0 || editor.cursor_col < width {
        0
    } else {
        editor.cursor_col + 1 - width
    }
}

fn single_line<'a>(editor: &Editor, width: usize) -> Line<'a> {
    let offset = column_offset(editor, width);
    let text: String = editor
        .lines
        .first()
        .map(|l| l.chars().skip(offset).take(width).collect())
        .unwrap_or_default();
    Line::from(text)
}

fn selector_line<'a, T: Copy + PartialEq>(
    options: &[T],
    selected: T,
    label: impl Fn(T) -> &'static str,
    color: impl Fn(T) -> ratatui::style::Color,
) -> Line<'a> {
    let mut spans = Vec::new();
    for option in options {
        let style = if *option == selected {
            Style::default().fg(color(*option)).add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(color(*option))
        };
        spans.push(Span::styled(format!(" {} ", label(*option)), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

/// Render the add/edit task modal
pub fn render_task_form(
    f: &mut Frame,
    area: Rect,
    editors: &FormEditors,
    selectors: (Priority, Status),
    editing: bool,
    submitting: bool,
    theme: &Theme,
) {
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let highlight_fg = if theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&theme.highlight_fg)
    };
    let base = Style::default().fg(fg_color).bg(bg_color);
    let active_border = Style::default().fg(highlight_bg).bg(bg_color);
    let active_text = Style::default().fg(highlight_fg).bg(highlight_bg);
    let inactive_text = base.add_modifier(Modifier::DIM);

    let popup = popup_area(area, 70, 90);
    f.render_widget(Clear, popup);

    let title = match (editing, submitting) {
        (_, true) => "Saving...",
        (true, false) => "Edit Task",
        (false, false) => "Create New Task",
    };
    let outer = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_alignment(Alignment::Center)
        .style(base);
    let inner = outer.inner(popup);
    f.render_widget(outer, popup);

    let field_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(4),    // Description
            Constraint::Length(3), // Priority
            Constraint::Length(3), // Status
            Constraint::Length(3), // Due date
            Constraint::Length(3), // Tags
        ])
        .split(inner);

    let field_block = |field: FormField| {
        let is_active = editors.current_field == field;
        let label = if field == FormField::Title { "Title *" } else { field.label() };
        Block::default()
            .borders(Borders::ALL)
            .title(label)
            .border_style(if is_active { active_border } else { base })
    };
    let text_style = |field: FormField| {
        if editors.current_field == field { active_text } else { inactive_text }
    };

    let single_fields = [
        (FormField::Title, &editors.title, field_areas[0]),
        (FormField::DueDate, &editors.due_date, field_areas[4]),
        (FormField::Tags, &editors.tags, field_areas[5]),
    ];
    for (field, editor, field_area) in single_fields {
        let width = field_area.width.saturating_sub(2) as usize;
        let paragraph = Paragraph::new(single_line(editor, width))
            .style(text_style(field))
            .block(field_block(field));
        f.render_widget(paragraph, field_area);
    }

    // Description (multi-line)
    let desc_area = field_areas[1];
    let content_height = desc_area.height.saturating_sub(2) as usize;
    let scroll = scroll_for(&editors.description, content_height);
    let desc_lines: Vec<Line> = editors
        .description
        .lines
        .iter()
        .skip(scroll)
        .take(content_height)
        .map(|l| Line::from(l.clone()))
        .collect();
    f.render_widget(
        Paragraph::new(desc_lines)
            .style(text_style(FormField::Description))
            .block(field_block(FormField::Description)),
        desc_area,
    );
    let total_lines = editors.description.lines.len();
    if total_lines > content_height && desc_area.height > 2 {
        let scrollbar_area = Rect::new(
            desc_area.x + desc_area.width.saturating_sub(1),
            desc_area.y + 1,
            1,
            desc_area.height.saturating_sub(2),
        );
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .viewport_content_length(content_height)
            .position(scroll);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");
        f.render_stateful_widget(scrollbar, scrollbar_area, &mut scrollbar_state);
    }

    let (priority, status) = selectors;
    f.render_widget(
        Paragraph::new(selector_line(&Priority::ALL, priority, |p| p.label(), priority_color))
            .style(base)
            .block(field_block(FormField::Priority)),
        field_areas[2],
    );
    f.render_widget(
        Paragraph::new(selector_line(&Status::ALL, status, |s| s.label(), status_color))
            .style(base)
            .block(field_block(FormField::Status)),
        field_areas[3],
    );

    if let Some((x, y)) = cursor_position(editors, &field_areas) {
        f.set_cursor_position((x, y));
    }
}

fn cursor_position(editors: &FormEditors, field_areas: &[Rect]) -> Option<(u16, u16)> {
    let (editor, field_area) = match editors.current_field {
        FormField::Title => (&editors.title, field_areas[0]),
        FormField::Description => (&editors.description, field_areas[1]),
        FormField::DueDate => (&editors.due_date, field_areas[4]),
        FormField::Tags => (&editors.tags, field_areas[5]),
        FormField::Priority | FormField::Status => return None,
    };
    let width = field_area.width.saturating_sub(2) as usize;
    let height = field_area.height.saturating_sub(2) as usize;
    let line = editor.cursor_line - scroll_for(editor, height);
    let col = editor.cursor_col - column_offset(editor, width);
    Some((field_area.x + 1 + col as u16, field_area.y + 1 + line as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_single_line_scrolls_with_cursor() {
        let editor = Editor::new().with_content("abcdefghij");
        assert_eq!(column_offset(&editor, 4), 7);
        assert_eq!(single_line(&editor, 4), Line::from("hij"));
    }

    #[test]
    fn description_scrolls_to_cursor_line() {
        let editor = Editor::multi_line().with_content("1\n2\n3\n4\n5");
        assert_eq!(scroll_for(&editor, 2), 3);
        assert_eq!(scroll_for(&editor, 10), 0);
    }
}
