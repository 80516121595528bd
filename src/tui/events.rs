use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
    size as terminal_size,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use std::io;
use std::time::Duration;

use crate::models::TaskFilter;
use crate::tui::app::{App, FormEditors, FormField, Mode, Route};
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::tui::widgets::confirm_delete::OPTIONS as DELETE_OPTIONS;
use crate::utils::{ParsedKeyBinding, parse_key_binding};

/// Guard that restores terminal state even on panic
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Restore explicitly on normal exit; drop then does nothing
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    // Check size before entering the alternate screen so the error is readable
    let (width, height) = terminal_size()?;
    if width < Layout::MIN_WIDTH || height < Layout::MIN_HEIGHT {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width,
            height,
            Layout::MIN_WIDTH,
            Layout::MIN_HEIGHT
        )));
    }

    let mut guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        app.drain_outcomes();
        app.check_status_message_timeout();

        let size = terminal.size()?;
        let terminal_rect = Rect::new(0, 0, size.width, size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(terminal_rect);
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        // Only Press events; Windows also reports releases
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press && handle_key_event(&mut app, key_event)? {
                    break;
                }
            }
        }
    }

    guard.restore()?;
    tracing::debug!("terminal restored");
    Ok(())
}

fn binding(key: &str) -> Result<ParsedKeyBinding, TuiError> {
    parse_key_binding(key).map_err(TuiError::KeyBindingError)
}

fn matches_key_event(key_event: KeyEvent, key: &str) -> Result<bool, TuiError> {
    Ok(binding(key)?.matches(key_event.code, key_event.modifiers))
}

/// Returns `true` when the user asked to quit
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if app.controller.pending_delete().is_some() {
        handle_delete_confirmation(app, key_event);
        return Ok(false);
    }

    if let Route::NotFound(_) = app.ui.route {
        return handle_not_found(app, key_event);
    }

    match app.ui.mode {
        Mode::Help => {
            app.ui.mode = Mode::View;
            Ok(false)
        }
        Mode::Search => {
            handle_search_mode(app, key_event);
            Ok(false)
        }
        Mode::Form => {
            handle_form_mode(app, key_event)?;
            Ok(false)
        }
        Mode::View => handle_view_mode(app, key_event),
    }
}

fn handle_not_found(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if matches_key_event(key_event, &app.config.key_bindings.quit)? {
        return Ok(true);
    }
    if matches!(key_event.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('h')) {
        app.go_home();
    }
    Ok(false)
}

fn handle_delete_confirmation(app: &mut App, key_event: KeyEvent) {
    let last = DELETE_OPTIONS.len() - 1;
    match key_event.code {
        KeyCode::Up | KeyCode::Left => {
            app.ui.delete_selection = if app.ui.delete_selection == 0 { last } else { app.ui.delete_selection - 1 };
        }
        KeyCode::Down | KeyCode::Right | KeyCode::Tab => {
            app.ui.delete_selection = if app.ui.delete_selection >= last { 0 } else { app.ui.delete_selection + 1 };
        }
        KeyCode::Enter => {
            if app.ui.delete_selection == 0 {
                app.confirm_delete();
            } else {
                app.cancel_delete();
            }
        }
        KeyCode::Char('y') => app.confirm_delete(),
        KeyCode::Esc | KeyCode::Char('n') => app.cancel_delete(),
        _ => {}
    }
}

fn handle_view_mode(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    let kb = app.config.key_bindings.clone();

    if matches_key_event(key_event, &kb.quit)? {
        return Ok(true);
    }
    if matches_key_event(key_event, &kb.help)? {
        app.ui.mode = Mode::Help;
    } else if matches_key_event(key_event, &kb.list_down)? || key_event.code == KeyCode::Down {
        app.select_next();
    } else if matches_key_event(key_event, &kb.list_up)? || key_event.code == KeyCode::Up {
        app.select_previous();
    } else if matches_key_event(key_event, &kb.new)? {
        app.open_create_form();
    } else if matches_key_event(key_event, &kb.edit)? || key_event.code == KeyCode::Enter {
        app.open_edit_form();
    } else if matches_key_event(key_event, &kb.delete)? || key_event.code == KeyCode::Delete {
        app.request_delete_selected();
    } else if matches_key_event(key_event, &kb.toggle_status)? {
        app.toggle_selected();
    } else if matches_key_event(key_event, &kb.search)? {
        app.enter_search_mode();
    } else if matches_key_event(key_event, &kb.filter_next)? {
        let next = app.controller.filter().next();
        app.set_filter(next);
    } else if matches_key_event(key_event, &kb.filter_prev)? {
        let prev = app.controller.filter().prev();
        app.set_filter(prev);
    } else if matches_key_event(key_event, &kb.toggle_theme)? {
        app.toggle_theme();
    } else if matches_key_event(key_event, &kb.reload)? {
        app.reload();
    } else if let KeyCode::Char(c @ '1'..='6') = key_event.code {
        let idx = c as usize - '1' as usize;
        app.set_filter(TaskFilter::ALL[idx]);
    } else if key_event.code == KeyCode::Esc && !app.controller.search().is_empty() {
        app.update_search(|query| query.clear());
    }
    Ok(false)
}

fn handle_search_mode(app: &mut App, key_event: KeyEvent) {
    match key_event.code {
        KeyCode::Esc => {
            app.update_search(|query| query.clear());
            app.exit_search_mode();
        }
        KeyCode::Enter | KeyCode::Down | KeyCode::Tab => app.exit_search_mode(),
        KeyCode::Backspace => app.update_search(|query| {
            query.pop();
        }),
        KeyCode::Char(c) => app.update_search(|query| query.push(c)),
        _ => {}
    }
}

fn handle_form_mode(app: &mut App, key_event: KeyEvent) -> Result<(), TuiError> {
    if app.controller.is_submitting() {
        return Ok(());
    }
    if matches_key_event(key_event, &app.config.key_bindings.save)? {
        app.submit_form();
        return Ok(());
    }

    let Some(field) = app.form.as_ref().map(|f| f.current_field) else {
        app.cancel_form();
        return Ok(());
    };

    match key_event.code {
        KeyCode::Esc => app.cancel_form(),
        KeyCode::Left | KeyCode::Right if field == FormField::Priority => {
            app.cycle_priority(key_event.code == KeyCode::Right);
        }
        KeyCode::Left | KeyCode::Right if field == FormField::Status => {
            app.cycle_status(key_event.code == KeyCode::Right);
        }
        code => {
            if let Some(editors) = app.form.as_mut() {
                edit_form_field(editors, field, code);
            }
        }
    }
    Ok(())
}

fn edit_form_field(editors: &mut FormEditors, field: FormField, code: KeyCode) {
    match code {
        KeyCode::Tab => editors.current_field = field.next(),
        KeyCode::BackTab => editors.current_field = field.prev(),
        KeyCode::Enter if field != FormField::Description => editors.current_field = field.next(),
        code => {
            let Some(editor) = editors.current_editor() else {
                return;
            };
            match code {
                KeyCode::Char(c) => editor.insert_char(c),
                KeyCode::Enter => editor.insert_newline(),
                KeyCode::Backspace => editor.delete_char(),
                KeyCode::Delete => editor.delete_forward(),
                KeyCode::Left => editor.move_left(),
                KeyCode::Right => editor.move_right(),
                KeyCode::Up => editor.move_up(),
                KeyCode::Down => editor.move_down(),
                KeyCode::Home => editor.move_home(),
                KeyCode::End => editor.move_end(),
                _ => {}
            }
        }
    }
}
