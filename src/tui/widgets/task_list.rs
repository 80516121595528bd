use chrono::NaiveDate;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, StatefulWidget,
};

use crate::config::Theme;
use crate::models::Task;
use crate::tui::widgets::color::{
    get_contrast_text_color, parse_color, priority_color, priority_symbol, status_color,
};
use crate::tui::widgets::truncate;
use crate::utils::format_due_date;

/// Each card takes two rows
const ROWS_PER_TASK: usize = 2;

pub struct TaskListView<'a> {
    pub tasks: &'a [&'a Task],
    pub total: usize,
    /// Filter or search is narrowing the list
    pub narrowed: bool,
    pub loading: bool,
    pub signed_in: bool,
    pub today: NaiveDate,
}

/// Empty-state heading and hint
pub fn empty_state(narrowed: bool) -> (&'static str, &'static str) {
    if narrowed {
        ("No tasks match your criteria", "Try adjusting your search or filter settings")
    } else {
        ("No tasks yet", "Create your first task to get started with TaskFlow")
    }
}

fn task_item<'a>(task: &Task, today: NaiveDate, max_width: usize, fg: Color) -> ListItem<'a> {
    let done = task.is_completed();
    let checkbox = if done { "[✓]" } else { "[ ]" };
    let title_style = if done {
        Style::default().fg(fg).add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
    } else {
        Style::default().fg(fg).add_modifier(Modifier::BOLD)
    };
    let title_width = max_width.saturating_sub(8);

    let first = Line::from(vec![
        Span::raw(format!("{} ", checkbox)),
        Span::styled(
            format!("{} ", priority_symbol(task.priority)),
            Style::default().fg(priority_color(task.priority)),
        ),
        Span::styled(truncate(&task.title, title_width), title_style),
    ]);

    let mut details = vec![
        Span::raw("      "),
        Span::styled(task.status.label(), Style::default().fg(status_color(task.status))),
        Span::raw(" · "),
        Span::styled(task.priority.label(), Style::default().fg(priority_color(task.priority))),
    ];
    if let Some(due) = task.due_date {
        let overdue = task.is_overdue(today);
        let style = if overdue {
            Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(fg)
        };
        let label = if overdue {
            format!(" · Due {} (overdue)", format_due_date(due, today))
        } else {
            format!(" · Due {}", format_due_date(due, today))
        };
        details.push(Span::styled(label, style));
    }
    if !task.tags.trim().is_empty() {
        details.push(Span::styled(
            format!(" · #{}", task.tags.trim()),
            Style::default().fg(fg).add_modifier(Modifier::DIM),
        ));
    }

    ListItem::new(vec![first, Line::from(details)])
}

pub fn render_task_list(
    f: &mut Frame,
    area: Rect,
    view: &TaskListView,
    list_state: &mut ListState,
    theme: &Theme,
) {
    let max_width = area.width.saturating_sub(4) as usize; // 2 for borders, 2 for padding
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);
    let highlight_bg = parse_color(&theme.highlight_bg);
    let highlight_fg = if theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&theme.highlight_fg)
    };

    let title = if view.loading {
        format!("Tasks ({} of {}) - loading...", view.tasks.len(), view.total)
    } else {
        format!("Tasks ({} of {})", view.tasks.len(), view.total)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(Style::default().fg(fg_color).bg(bg_color));

    if view.tasks.is_empty() {
        let lines = if !view.signed_in {
            vec![Line::from(""), Line::from("Sign in to view your tasks")]
        } else if view.loading && view.total == 0 {
            vec![Line::from("Loading tasks...")]
        } else {
            let (heading, hint) = empty_state(view.narrowed);
            vec![
                Line::from(""),
                Line::from(Span::styled(heading, Style::default().add_modifier(Modifier::BOLD))),
                Line::from(Span::styled(hint, Style::default().add_modifier(Modifier::DIM))),
            ]
        };
        let paragraph = Paragraph::new(lines).block(block).alignment(Alignment::Center);
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = view
        .tasks
        .iter()
        .map(|task| task_item(task, view.today, max_width, fg_color))
        .collect();
    let total_items = items.len();

    // Split area to reserve space for scrollbar
    let list_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let list_area = list_areas[0];
    let scrollbar_area = list_areas[1];

    let list = List::new(items)
        .block(block)
        .style(Style::default().fg(fg_color))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));

    StatefulWidget::render(list, list_area, f.buffer_mut(), list_state);

    let list_inner_height = list_area.height.saturating_sub(2) as usize;
    let visible_items = list_inner_height / ROWS_PER_TASK;

    if total_items > visible_items && scrollbar_area.width > 0 && list_area.height > 2 {
        let scrollbar_inner_area = Rect::new(
            scrollbar_area.x,
            list_area.y + 1,
            scrollbar_area.width,
            list_area.height.saturating_sub(2),
        );
        let selected_index = list_state.selected().unwrap_or(0);
        let scroll_position = if selected_index < visible_items {
            0
        } else {
            selected_index.saturating_sub(visible_items.saturating_sub(1))
        };
        let mut scrollbar_state = ScrollbarState::new(total_items)
            .viewport_content_length(visible_items)
            .position(scroll_position);
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");
        f.render_stateful_widget(scrollbar, scrollbar_inner_area, &mut scrollbar_state);
    }
}
