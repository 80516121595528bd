use ratatui::Frame;
use ratatui::layout::Alignment;
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders};

use crate::tui::app::{App, Mode, Route};
use crate::tui::layout::Layout;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::confirm_delete::render_confirm_delete;
use crate::tui::widgets::form::render_task_form;
use crate::tui::widgets::header::{APP_TITLE, HeaderView, render_header};
use crate::tui::widgets::help::render_help;
use crate::tui::widgets::not_found::render_not_found;
use crate::tui::widgets::stats_panel::render_stats_panel;
use crate::tui::widgets::status_bar::render_status_bar;
use crate::tui::widgets::task_list::{TaskListView, render_task_list};
use crate::tui::widgets::toolbar::render_toolbar;
use crate::utils::format_key_binding_for_display;

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let theme = app.theme();
    let fg_color = parse_color(&theme.fg);
    let bg_color = parse_color(&theme.bg);

    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title(APP_TITLE)
        .title_alignment(Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());

    let header = HeaderView {
        backend: &app.controller.service().backend_label(),
        dark: app.is_dark(),
        loading: app.controller.is_loading(),
        submitting: app.controller.is_submitting(),
    };
    render_header(f, layout.header_area, &header, &theme);

    if let Route::NotFound(ref path) = app.ui.route {
        let body = ratatui::layout::Rect {
            height: layout.inner_area.height.saturating_sub(layout.header_area.height + 1),
            ..layout.stats_area
        };
        render_not_found(f, body, path, &theme);
    } else {
        render_stats_panel(f, layout.stats_area, &app.controller.stats(), &theme);
        render_toolbar(
            f,
            layout.toolbar_area,
            app.controller.search(),
            app.ui.mode == Mode::Search,
            app.controller.filter(),
            &theme,
        );

        let tasks = app.controller.visible_tasks();
        let view = TaskListView {
            tasks: &tasks,
            total: app.controller.tasks().len(),
            narrowed: app.controller.is_narrowed(),
            loading: app.controller.is_loading(),
            signed_in: app.controller.is_authenticated(),
            today: app.controller.today(),
        };
        render_task_list(f, layout.list_area, &view, &mut app.ui.list_state, &theme);
    }

    let key_hints = get_key_hints(app);
    render_status_bar(f, layout.status_area, app.status.message.as_ref(), &key_hints, &theme);

    // Overlays
    if let Some(editors) = app.form.as_ref().filter(|_| app.ui.mode == Mode::Form) {
        render_task_form(
            f,
            layout.inner_area,
            editors,
            app.form_selectors(),
            app.controller.form().is_some_and(|form| form.is_editing()),
            app.controller.is_submitting(),
            &theme,
        );
    }
    if app.ui.mode == Mode::Help {
        render_help(f, layout.inner_area, &app.config.key_bindings, &theme);
    }
    if let Some(id) = app.controller.pending_delete() {
        let title = app.controller.task(id).map(|t| t.title.as_str()).unwrap_or_default();
        render_confirm_delete(f, layout.inner_area, title, app.ui.delete_selection, &theme);
    }
}

fn get_key_hints(app: &App) -> Vec<String> {
    let kb = &app.config.key_bindings;
    let key = |binding: &str| format_key_binding_for_display(binding);

    if app.controller.pending_delete().is_some() {
        return vec![
            "↑↓: Select".to_string(),
            "Enter: Confirm".to_string(),
            "Esc: Cancel".to_string(),
        ];
    }
    if let Route::NotFound(_) = app.ui.route {
        return vec![
            "Enter: Back to TaskFlow".to_string(),
            format!("{}: Quit", key(&kb.quit)),
        ];
    }

    match app.ui.mode {
        Mode::View => vec![
            format!("{}: New", key(&kb.new)),
            format!("{}: Edit", key(&kb.edit)),
            format!("{}: Toggle", key(&kb.toggle_status)),
            format!("{}: Delete", key(&kb.delete)),
            format!("{}: Search", key(&kb.search)),
            format!("{}/{}: Filter", key(&kb.filter_next), key(&kb.filter_prev)),
            format!("{}: Theme", key(&kb.toggle_theme)),
            format!("{}: Help", key(&kb.help)),
            format!("{}: Quit", key(&kb.quit)),
        ],
        Mode::Search => vec![
            "Type to search".to_string(),
            "Enter: Done".to_string(),
            "Esc: Clear".to_string(),
        ],
        Mode::Form => vec![
            format!("{}: Save", key(&kb.save)),
            "Tab: Next field".to_string(),
            "←→: Change option".to_string(),
            "Esc: Cancel".to_string(),
        ],
        Mode::Help => vec!["Any key: Close".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use crate::clock::FixedClock;
    use crate::controller::TaskListController;
    use crate::models::TaskDraft;
    use crate::service::TaskService;
    use crate::store::LocalStore;
    use chrono::{TimeZone, Utc};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::layout::Rect;
    use std::sync::Arc;
    use tokio::runtime::Handle;

    async fn app(route: Route) -> App {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap()));
        let store = LocalStore::open_in_memory(clock.clone()).unwrap();
        let service = Arc::new(TaskService::new(Arc::new(store), "tasks", clock));
        service.create_task(TaskDraft::new("Write report")).await.unwrap();
        let mut app = App::new(Config::default(), TaskListController::new(service), Handle::current(), route);
        app.start(true);
        app.settle().await;
        app
    }

    fn draw(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(90, 30)).unwrap();
        terminal
            .draw(|f| {
                let layout = Layout::calculate(Rect::new(0, 0, 90, 30));
                render(f, app, &layout);
            })
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[tokio::test]
    async fn home_screen_shows_stats_and_tasks() {
        let mut app = app(Route::Home).await;
        let screen = draw(&mut app);
        assert!(screen.contains("Organize Your Work"));
        assert!(screen.contains("Write report"));
        assert!(screen.contains("1 Total"));
        assert!(screen.contains("Search tasks..."));
    }

    #[tokio::test]
    async fn unknown_route_shows_404() {
        let mut app = app(Route::from_path("/missing")).await;
        let screen = draw(&mut app);
        assert!(screen.contains("404"));
        assert!(screen.contains("Page Not Found"));
        assert!(!screen.contains("Write report"));
    }
}
