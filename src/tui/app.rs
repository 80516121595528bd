use ratatui::widgets::ListState;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::Config;
use crate::config::Theme;
use crate::controller::{
    MutationOutcome, MutationRequest, Notice, ReloadOutcome, ReloadRequest, TaskListController,
};
use crate::models::{Priority, Status, Task, TaskFilter, TaskId};
use crate::tui::widgets::color::is_dark_theme;
use crate::tui::widgets::editor::Editor;

pub const SIGNED_OUT_HINT: &str = "Not signed in. Set a session token to load your tasks.";

/// Screens reachable in the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    NotFound(String),
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        match path.trim().trim_end_matches('/') {
            "" | "/tasks" => Route::Home,
            other => Route::NotFound(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    View,
    Search,
    Form,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    Priority,
    Status,
    DueDate,
    Tags,
}

impl FormField {
    pub const ORDER: [FormField; 6] = [
        FormField::Title,
        FormField::Description,
        FormField::Priority,
        FormField::Status,
        FormField::DueDate,
        FormField::Tags,
    ];

    pub fn next(&self) -> Self {
        let idx = Self::ORDER.iter().position(|f| f == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ORDER.iter().position(|f| f == self).unwrap_or(0);
        Self::ORDER[(idx + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::Priority => "Priority",
            FormField::Status => "Status",
            FormField::DueDate => "Due Date (YYYY-MM-DD)",
            FormField::Tags => "Tags",
        }
    }
}

/// Text editors backing the add/edit modal. Selectors live in the controller form.
#[derive(Debug, Clone)]
pub struct FormEditors {
    pub current_field: FormField,
    pub title: Editor,
    pub description: Editor,
    pub due_date: Editor,
    pub tags: Editor,
}

impl FormEditors {
    pub fn current_editor(&mut self) -> Option<&mut Editor> {
        match self.current_field {
            FormField::Title => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::DueDate => Some(&mut self.due_date),
            FormField::Tags => Some(&mut self.tags),
            FormField::Priority | FormField::Status => None,
        }
    }
}

#[derive(Debug)]
pub struct UiState {
    pub route: Route,
    pub mode: Mode,
    pub list_state: ListState,
    /// Session-only theme flip; never written back to the config file
    pub theme_override: Option<String>,
    /// 0 = Delete, 1 = Cancel
    pub delete_selection: usize,
}

#[derive(Debug, Default)]
pub struct StatusState {
    pub message: Option<Notice>,
    pub message_time: Option<Instant>,
}

/// Completed background work
pub enum Outcome {
    Reload(ReloadOutcome),
    Mutation(MutationOutcome),
}

/// Runs service calls on the tokio runtime and collects their outcomes
pub struct Dispatcher {
    handle: Handle,
    tx: mpsc::UnboundedSender<Outcome>,
    rx: mpsc::UnboundedReceiver<Outcome>,
    in_flight: usize,
}

impl Dispatcher {
    pub fn new(handle: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { handle, tx, rx, in_flight: 0 }
    }

    fn reload(&mut self, request: ReloadRequest) {
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.handle.spawn(async move {
            let _ = tx.send(Outcome::Reload(request.run().await));
        });
    }

    fn mutation(&mut self, request: MutationRequest) {
        let tx = self.tx.clone();
        self.in_flight += 1;
        self.handle.spawn(async move {
            let _ = tx.send(Outcome::Mutation(request.run().await));
        });
    }

    fn try_next(&mut self) -> Option<Outcome> {
        let outcome = self.rx.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(outcome)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }
}

pub struct App {
    pub config: Config,
    pub controller: TaskListController,
    pub ui: UiState,
    pub status: StatusState,
    pub form: Option<FormEditors>,
    pub dispatcher: Dispatcher,
}

impl App {
    pub fn new(config: Config, controller: TaskListController, handle: Handle, route: Route) -> Self {
        Self {
            config,
            controller,
            ui: UiState {
                route,
                mode: Mode::View,
                list_state: ListState::default(),
                theme_override: None,
                delete_selection: 0,
            },
            status: StatusState::default(),
            form: None,
            dispatcher: Dispatcher::new(handle),
        }
    }

    /// Record the session state and start the first load when signed in
    pub fn start(&mut self, authenticated: bool) {
        let request = self.controller.set_authenticated(authenticated);
        self.dispatch_reload(request);
        if !authenticated {
            self.set_status(Notice::info(SIGNED_OUT_HINT));
        }
    }

    pub fn theme(&self) -> Theme {
        match self.ui.theme_override {
            Some(ref name) => self.config.resolve_theme(name),
            None => self.config.get_active_theme(),
        }
    }

    pub fn is_dark(&self) -> bool {
        is_dark_theme(&self.theme())
    }

    pub fn toggle_theme(&mut self) {
        let next = if self.is_dark() { "light" } else { "dark" };
        self.ui.theme_override = Some(next.to_string());
    }

    pub fn go_home(&mut self) {
        self.ui.route = Route::Home;
        self.ui.mode = Mode::View;
    }

    pub fn dispatch_reload(&mut self, request: Option<ReloadRequest>) {
        if let Some(request) = request {
            self.dispatcher.reload(request);
        }
    }

    pub fn dispatch_mutation(&mut self, request: Option<MutationRequest>) {
        if let Some(request) = request {
            self.dispatcher.mutation(request);
        }
        self.collect_notices();
    }

    /// Fold finished background work into the controller
    pub fn drain_outcomes(&mut self) {
        while let Some(outcome) = self.dispatcher.try_next() {
            self.apply_outcome(outcome);
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Reload(outcome) => {
                self.controller.finish_reload(outcome);
                self.clamp_selection();
            }
            Outcome::Mutation(outcome) => {
                let reload = self.controller.finish_mutation(outcome);
                self.dispatch_reload(reload);
                if self.ui.mode == Mode::Form && self.controller.form().is_none() {
                    self.form = None;
                    self.ui.mode = Mode::View;
                }
            }
        }
        self.collect_notices();
    }

    /// Wait for every outstanding call and apply it
    #[cfg(test)]
    pub async fn settle(&mut self) {
        while self.dispatcher.is_busy() {
            if let Some(outcome) = self.dispatcher.rx.recv().await {
                self.dispatcher.in_flight -= 1;
                self.apply_outcome(outcome);
            }
        }
    }

    /// Show the newest queued notice in the status bar
    pub fn collect_notices(&mut self) {
        if let Some(notice) = self.controller.take_notices().pop() {
            self.set_status(notice);
        }
    }

    pub fn set_status(&mut self, notice: Notice) {
        self.status.message = Some(notice);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    /// Auto-clear the status message after 3 seconds
    pub fn check_status_message_timeout(&mut self) {
        const STATUS_MESSAGE_TIMEOUT_SECS: u64 = 3;
        if let Some(time) = self.status.message_time {
            if time.elapsed().as_secs() >= STATUS_MESSAGE_TIMEOUT_SECS {
                self.clear_status_message();
            }
        }
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        self.controller.visible_tasks()
    }

    pub fn selected_task_id(&self) -> Option<TaskId> {
        let idx = self.ui.list_state.selected()?;
        self.visible_tasks().get(idx).map(|t| t.id.clone())
    }

    pub fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        let selected = match (len, self.ui.list_state.selected()) {
            (0, _) => None,
            (_, None) => Some(0),
            (len, Some(idx)) => Some(idx.min(len - 1)),
        };
        self.ui.list_state.select(selected);
    }

    pub fn select_next(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            return;
        }
        let next = self.ui.list_state.selected().map_or(0, |i| (i + 1) % len);
        self.ui.list_state.select(Some(next));
    }

    pub fn select_previous(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            return;
        }
        let prev = self
            .ui
            .list_state
            .selected()
            .map_or(0, |i| if i == 0 { len - 1 } else { i - 1 });
        self.ui.list_state.select(Some(prev));
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        let request = self.controller.set_filter(filter);
        self.dispatch_reload(request);
        self.clamp_selection();
    }

    pub fn enter_search_mode(&mut self) {
        self.ui.mode = Mode::Search;
    }

    pub fn exit_search_mode(&mut self) {
        self.ui.mode = Mode::View;
    }

    pub fn update_search(&mut self, edit: impl FnOnce(&mut String)) {
        let mut query = self.controller.search().to_string();
        edit(&mut query);
        let request = self.controller.set_search(query);
        self.dispatch_reload(request);
        self.clamp_selection();
    }

    pub fn open_create_form(&mut self) {
        self.controller.open_create_form();
        self.load_form_editors();
    }

    pub fn open_edit_form(&mut self) {
        let Some(id) = self.selected_task_id() else {
            self.set_status(Notice::info("No task selected"));
            return;
        };
        if self.controller.open_edit_form(&id) {
            self.load_form_editors();
        } else {
            self.collect_notices();
        }
    }

    fn load_form_editors(&mut self) {
        let Some(form) = self.controller.form() else {
            return;
        };
        self.form = Some(FormEditors {
            current_field: FormField::Title,
            title: Editor::new().with_content(&form.title),
            description: Editor::multi_line().with_content(&form.description),
            due_date: Editor::new().with_content(&form.due_date),
            tags: Editor::new().with_content(&form.tags),
        });
        self.ui.mode = Mode::Form;
    }

    /// Copy editor contents into the controller form
    pub fn sync_form(&mut self) {
        let (Some(editors), Some(form)) = (self.form.as_ref(), self.controller.form_mut()) else {
            return;
        };
        form.title = editors.title.text();
        form.description = editors.description.text();
        form.due_date = editors.due_date.text();
        form.tags = editors.tags.text();
    }

    pub fn cycle_priority(&mut self, forward: bool) {
        if let Some(form) = self.controller.form_mut() {
            form.priority = if forward { form.priority.next() } else { form.priority.prev() };
        }
    }

    pub fn cycle_status(&mut self, forward: bool) {
        if let Some(form) = self.controller.form_mut() {
            form.status = if forward { form.status.next() } else { form.status.prev() };
        }
    }

    pub fn form_selectors(&self) -> (Priority, Status) {
        self.controller
            .form()
            .map_or((Priority::default(), Status::default()), |f| (f.priority, f.status))
    }

    pub fn submit_form(&mut self) {
        self.sync_form();
        let request = self.controller.start_submit();
        self.dispatch_mutation(request);
    }

    pub fn cancel_form(&mut self) {
        self.controller.close_form();
        self.form = None;
        self.ui.mode = Mode::View;
    }

    pub fn toggle_selected(&mut self) {
        if let Some(id) = self.selected_task_id() {
            let request = self.controller.start_toggle(&id);
            self.dispatch_mutation(request);
        }
    }

    pub fn request_delete_selected(&mut self) {
        if let Some(id) = self.selected_task_id() {
            self.controller.request_delete(&id);
            self.ui.delete_selection = 0;
            self.collect_notices();
        }
    }

    pub fn confirm_delete(&mut self) {
        let request = self.controller.start_delete();
        self.dispatch_mutation(request);
    }

    pub fn cancel_delete(&mut self) {
        self.controller.cancel_delete();
    }

    pub fn reload(&mut self) {
        let request = self.controller.start_reload();
        self.dispatch_reload(request);
    }
}
