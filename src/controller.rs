//! Task list controller.
//!
//! Owns the in-memory snapshot of tasks and everything the list screen
//! needs around it: the filter selector, search text, the add/edit form,
//! in-flight flags, delete confirmation and queued notices.
//!
//! Backend work is split in three steps so a UI loop can stay responsive:
//! `start_*` validates and returns a request value, the request's `run`
//! future talks to the service, and `finish_*` folds the outcome back in.
//! The async helpers (`reload`, `submit_form`, ...) chain all three.

use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::models::{
    FetchCriteria, Priority, Status, Task, TaskDraft, TaskFilter, TaskId, TaskPatch, TaskStats,
};
use crate::service::{ServiceError, TaskService};
use crate::utils::parse_date;

pub const MSG_TITLE_REQUIRED: &str = "Please enter a task title";
pub const MSG_INVALID_DUE_DATE: &str = "Please enter a valid due date (YYYY-MM-DD)";
pub const MSG_CREATED: &str = "Task created successfully!";
pub const MSG_UPDATED: &str = "Task updated successfully!";
pub const MSG_DELETED: &str = "Task deleted successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Error, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { kind: NoticeKind::Info, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{}", MSG_TITLE_REQUIRED)]
    MissingTitle,
    #[error("{}", MSG_INVALID_DUE_DATE)]
    InvalidDueDate(String),
}

/// Raw form state. The due date stays text until submit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub editing: Option<TaskId>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub due_date: String,
    pub tags: String,
    name: String,
}

impl TaskForm {
    pub fn for_task(task: &Task) -> Self {
        Self {
            editing: Some(task.id.clone()),
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            status: task.status,
            due_date: task
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            tags: task.tags.clone(),
            name: task.name.clone(),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// Validate and convert into a draft with a trimmed title
    pub fn to_draft(&self) -> Result<TaskDraft, FormError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormError::MissingTitle);
        }
        let due = self.due_date.trim();
        let due_date: Option<NaiveDate> = if due.is_empty() {
            None
        } else {
            Some(parse_date(due).map_err(|_| FormError::InvalidDueDate(due.to_string()))?)
        };
        Ok(TaskDraft {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            priority: self.priority,
            status: self.status,
            due_date,
            name: self.name.clone(),
            tags: self.tags.trim().to_string(),
        })
    }
}

/// A pending snapshot refresh
pub struct ReloadRequest {
    seq: u64,
    criteria: FetchCriteria,
    service: Arc<TaskService>,
}

impl ReloadRequest {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub async fn run(self) -> ReloadOutcome {
        let result = self.service.fetch_tasks(&self.criteria).await;
        ReloadOutcome { seq: self.seq, result }
    }
}

#[derive(Debug)]
pub struct ReloadOutcome {
    pub seq: u64,
    pub result: Result<Vec<Task>, ServiceError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create(TaskDraft),
    Update(TaskId, TaskPatch),
    Toggle(TaskId, Status),
    Delete(TaskId),
}

impl Mutation {
    fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create(_) => MutationKind::Create,
            Mutation::Update(..) => MutationKind::Update,
            Mutation::Toggle(..) => MutationKind::Toggle,
            Mutation::Delete(_) => MutationKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Toggle,
    Delete,
}

/// A pending backend write
pub struct MutationRequest {
    mutation: Mutation,
    service: Arc<TaskService>,
}

impl MutationRequest {
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    pub async fn run(self) -> MutationOutcome {
        let kind = self.mutation.kind();
        let result = match self.mutation {
            Mutation::Create(draft) => self.service.create_task(draft).await.map(|_| ()),
            Mutation::Update(id, patch) => self.service.update_task(&id, patch).await.map(|_| ()),
            Mutation::Toggle(id, status) => self
                .service
                .update_task(&id, TaskPatch::status(status))
                .await
                .map(|_| ()),
            Mutation::Delete(id) => self.service.delete_task(&id).await,
        };
        MutationOutcome { kind, result }
    }
}

#[derive(Debug)]
pub struct MutationOutcome {
    pub kind: MutationKind,
    pub result: Result<(), ServiceError>,
}

pub struct TaskListController {
    service: Arc<TaskService>,
    clock: Arc<dyn Clock>,
    tasks: Vec<Task>,
    filter: TaskFilter,
    search: String,
    form: Option<TaskForm>,
    submitting: bool,
    authenticated: bool,
    issued_seq: u64,
    applied_seq: u64,
    pending_delete: Option<TaskId>,
    notices: VecDeque<Notice>,
}

impl TaskListController {
    pub fn new(service: Arc<TaskService>) -> Self {
        let clock = service.clock().clone();
        Self {
            service,
            clock,
            tasks: Vec::new(),
            filter: TaskFilter::All,
            search: String::new(),
            form: None,
            submitting: false,
            authenticated: false,
            issued_seq: 0,
            applied_seq: 0,
            pending_delete: None,
            notices: VecDeque::new(),
        }
    }

    pub fn service(&self) -> &Arc<TaskService> {
        &self.service
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// True while the newest reload has not settled
    pub fn is_loading(&self) -> bool {
        self.issued_seq > self.applied_seq
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn form(&self) -> Option<&TaskForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut TaskForm> {
        self.form.as_mut()
    }

    pub fn pending_delete(&self) -> Option<&TaskId> {
        self.pending_delete.as_ref()
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Snapshot narrowed by the filter AND the search text
    pub fn visible_tasks(&self) -> Vec<&Task> {
        let today = self.today();
        self.tasks
            .iter()
            .filter(|t| self.filter.admits(t, today) && t.matches_search(&self.search))
            .collect()
    }

    /// Counts over the whole snapshot, independent of filter and search
    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks, self.today())
    }

    /// Whether a filter or search is narrowing the list
    pub fn is_narrowed(&self) -> bool {
        self.filter != TaskFilter::All || !self.search.trim().is_empty()
    }

    /// Session change. Signing in loads the collection; signing out drops it
    /// and invalidates any reload still in flight.
    pub fn set_authenticated(&mut self, authenticated: bool) -> Option<ReloadRequest> {
        let was = self.authenticated;
        self.authenticated = authenticated;
        if authenticated {
            if was { None } else { self.start_reload() }
        } else {
            self.tasks.clear();
            self.form = None;
            self.pending_delete = None;
            self.submitting = false;
            self.applied_seq = self.issued_seq;
            None
        }
    }

    pub fn set_filter(&mut self, filter: TaskFilter) -> Option<ReloadRequest> {
        if self.filter == filter {
            return None;
        }
        self.filter = filter;
        self.start_reload()
    }

    pub fn set_search(&mut self, search: impl Into<String>) -> Option<ReloadRequest> {
        let search = search.into();
        if self.search == search {
            return None;
        }
        self.search = search;
        self.start_reload()
    }

    /// Issue a reload of the full collection. Filtering happens locally so
    /// the stats always describe every task.
    pub fn start_reload(&mut self) -> Option<ReloadRequest> {
        if !self.authenticated {
            return None;
        }
        self.issued_seq += 1;
        tracing::debug!(seq = self.issued_seq, "reload issued");
        Some(ReloadRequest {
            seq: self.issued_seq,
            criteria: FetchCriteria::default(),
            service: self.service.clone(),
        })
    }

    /// Apply a reload result unless a newer one already landed.
    /// Returns whether the outcome was applied.
    pub fn finish_reload(&mut self, outcome: ReloadOutcome) -> bool {
        if outcome.seq <= self.applied_seq || !self.authenticated {
            tracing::debug!(seq = outcome.seq, applied = self.applied_seq, "stale reload discarded");
            return false;
        }
        self.applied_seq = outcome.seq;
        match outcome.result {
            Ok(tasks) => {
                tracing::debug!(seq = outcome.seq, count = tasks.len(), "reload applied");
                self.tasks = tasks;
                let gone = self
                    .pending_delete
                    .as_ref()
                    .is_some_and(|id| !self.tasks.iter().any(|t| &t.id == id));
                if gone {
                    self.pending_delete = None;
                }
            }
            Err(e) => self.push_notice(Notice::error(e.to_string())),
        }
        true
    }

    pub fn open_create_form(&mut self) {
        self.form = Some(TaskForm::default());
    }

    pub fn open_edit_form(&mut self, id: &TaskId) -> bool {
        match self.task(id).map(TaskForm::for_task) {
            Some(form) => {
                self.form = Some(form);
                true
            }
            None => {
                self.push_notice(Notice::error("Task not found"));
                false
            }
        }
    }

    pub fn close_form(&mut self) {
        self.form = None;
    }

    /// Validate the form and build the create/update call. Invalid input
    /// queues an error notice and never reaches the backend.
    pub fn start_submit(&mut self) -> Option<MutationRequest> {
        if self.submitting {
            return None;
        }
        let (draft, editing) = {
            let form = self.form.as_ref()?;
            (form.to_draft(), form.editing.clone())
        };
        let draft = match draft {
            Ok(draft) => draft,
            Err(e) => {
                self.push_notice(Notice::error(e.to_string()));
                return None;
            }
        };
        let mutation = match editing {
            Some(id) => Mutation::Update(id, TaskPatch::from_draft(draft)),
            None => Mutation::Create(draft),
        };
        self.submitting = true;
        Some(self.request(mutation))
    }

    /// Completed tasks go back to pending; anything else completes
    pub fn start_toggle(&mut self, id: &TaskId) -> Option<MutationRequest> {
        let Some(task) = self.task(id) else {
            self.push_notice(Notice::error("Task not found"));
            return None;
        };
        let next = task.status.toggled();
        Some(self.request(Mutation::Toggle(id.clone(), next)))
    }

    pub fn request_delete(&mut self, id: &TaskId) {
        if self.task(id).is_some() {
            self.pending_delete = Some(id.clone());
        } else {
            self.push_notice(Notice::error("Task not found"));
        }
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    /// Delete the task awaiting confirmation, if any
    pub fn start_delete(&mut self) -> Option<MutationRequest> {
        let id = self.pending_delete.take()?;
        Some(self.request(Mutation::Delete(id)))
    }

    /// Fold a write result back in. A successful write refreshes the snapshot.
    pub fn finish_mutation(&mut self, outcome: MutationOutcome) -> Option<ReloadRequest> {
        if matches!(outcome.kind, MutationKind::Create | MutationKind::Update) {
            self.submitting = false;
        }
        match outcome.result {
            Ok(()) => {
                match outcome.kind {
                    MutationKind::Create => {
                        self.form = None;
                        self.push_notice(Notice::success(MSG_CREATED));
                    }
                    MutationKind::Update => {
                        self.form = None;
                        self.push_notice(Notice::success(MSG_UPDATED));
                    }
                    MutationKind::Delete => self.push_notice(Notice::success(MSG_DELETED)),
                    MutationKind::Toggle => {}
                }
                self.start_reload()
            }
            Err(e) => {
                tracing::warn!(kind = ?outcome.kind, error = %e, "task write failed");
                self.push_notice(Notice::error(e.to_string()));
                None
            }
        }
    }

    fn request(&self, mutation: Mutation) -> MutationRequest {
        MutationRequest {
            mutation,
            service: self.service.clone(),
        }
    }

    /// Run a reload request to completion and apply it
    pub async fn settle(&mut self, request: Option<ReloadRequest>) {
        if let Some(request) = request {
            let outcome = request.run().await;
            self.finish_reload(outcome);
        }
    }

    pub async fn reload(&mut self) {
        let request = self.start_reload();
        self.settle(request).await;
    }

    async fn perform(&mut self, request: Option<MutationRequest>) -> bool {
        let Some(request) = request else {
            return false;
        };
        let outcome = request.run().await;
        let ok = outcome.result.is_ok();
        let reload = self.finish_mutation(outcome);
        self.settle(reload).await;
        ok
    }

    /// Returns whether the task was saved
    pub async fn submit_form(&mut self) -> bool {
        let request = self.start_submit();
        self.perform(request).await
    }

    pub async fn toggle_status(&mut self, id: &TaskId) -> bool {
        let request = self.start_toggle(id);
        self.perform(request).await
    }

    pub async fn confirm_delete(&mut self) -> bool {
        let request = self.start_delete();
        self.perform(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::LocalStore;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn controller() -> TaskListController {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap()));
        let store = LocalStore::open_in_memory(clock.clone()).unwrap();
        let service = Arc::new(TaskService::new(Arc::new(store), "tasks", clock));
        let mut c = TaskListController::new(service);
        let request = c.set_authenticated(true);
        c.settle(request).await;
        c
    }

    async fn add(c: &mut TaskListController, title: &str) {
        c.open_create_form();
        c.form_mut().unwrap().title = title.to_string();
        assert!(c.submit_form().await);
    }

    #[test]
    fn form_rejects_bad_due_date() {
        let form = TaskForm {
            title: "Pay rent".to_string(),
            due_date: "31/12/2024".to_string(),
            ..TaskForm::default()
        };
        assert_eq!(
            form.to_draft().unwrap_err(),
            FormError::InvalidDueDate("31/12/2024".to_string())
        );
    }

    #[tokio::test]
    async fn submit_creates_closes_form_and_notifies() {
        let mut c = controller().await;
        add(&mut c, "  Buy milk  ").await;
        assert!(c.form().is_none());
        assert_eq!(c.tasks().len(), 1);
        assert_eq!(c.tasks()[0].title, "Buy milk");
        assert_eq!(c.take_notices(), vec![Notice::success(MSG_CREATED)]);
        assert!(!c.is_submitting());
    }

    #[tokio::test]
    async fn blank_title_keeps_form_open() {
        let mut c = controller().await;
        c.open_create_form();
        c.form_mut().unwrap().title = "   ".to_string();
        assert!(!c.submit_form().await);
        assert!(c.form().is_some());
        assert!(c.tasks().is_empty());
        assert_eq!(c.take_notices(), vec![Notice::error(MSG_TITLE_REQUIRED)]);
    }

    #[tokio::test]
    async fn edit_form_updates_existing_task() {
        let mut c = controller().await;
        add(&mut c, "Draft").await;
        let id = c.tasks()[0].id.clone();
        assert!(c.open_edit_form(&id));
        {
            let form = c.form_mut().unwrap();
            form.title = "Final".to_string();
            form.priority = Priority::Urgent;
        }
        assert!(c.submit_form().await);
        assert_eq!(c.tasks()[0].title, "Final");
        assert_eq!(c.tasks()[0].priority, Priority::Urgent);
        assert!(c.take_notices().contains(&Notice::success(MSG_UPDATED)));
    }

    #[tokio::test]
    async fn stale_reload_is_discarded() {
        let mut c = controller().await;
        let older = c.start_reload().unwrap();
        add(&mut c, "fresh").await;
        let outcome = older.run().await;
        assert!(!c.finish_reload(outcome));
        assert_eq!(c.tasks().len(), 1);
    }

    #[tokio::test]
    async fn out_of_order_completion_keeps_newest() {
        let mut c = controller().await;
        let first = c.start_reload().unwrap();
        let second = c.start_reload().unwrap();
        assert!(c.is_loading());
        let second_outcome = second.run().await;
        let first_outcome = ReloadOutcome { seq: first.seq(), result: Ok(Vec::new()) };
        assert!(c.finish_reload(second_outcome));
        assert!(!c.finish_reload(first_outcome));
        assert!(!c.is_loading());
    }

    #[tokio::test]
    async fn failed_reload_keeps_snapshot_and_reports() {
        let mut c = controller().await;
        add(&mut c, "kept").await;
        c.take_notices();
        let request = c.start_reload().unwrap();
        let outcome = ReloadOutcome { seq: request.seq(), result: Err(ServiceError::FetchFailed) };
        assert!(c.finish_reload(outcome));
        assert_eq!(c.tasks().len(), 1);
        assert_eq!(
            c.take_notices(),
            vec![Notice::error("Failed to fetch tasks. Please try again.")]
        );
    }

    #[tokio::test]
    async fn signed_out_controller_does_not_load() {
        let mut c = controller().await;
        add(&mut c, "private").await;
        assert!(c.set_authenticated(false).is_none());
        assert!(c.tasks().is_empty());
        assert!(c.start_reload().is_none());
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let mut c = controller().await;
        add(&mut c, "temp").await;
        c.take_notices();
        let id = c.tasks()[0].id.clone();

        assert!(!c.confirm_delete().await);
        c.request_delete(&id);
        c.cancel_delete();
        assert!(!c.confirm_delete().await);
        assert_eq!(c.tasks().len(), 1);

        c.request_delete(&id);
        assert_eq!(c.pending_delete(), Some(&id));
        assert!(c.confirm_delete().await);
        assert!(c.tasks().is_empty());
        assert_eq!(c.take_notices(), vec![Notice::success(MSG_DELETED)]);
    }

    #[tokio::test]
    async fn filter_and_search_compose() {
        let mut c = controller().await;
        add(&mut c, "Write report").await;
        add(&mut c, "Read book").await;
        let id = c.tasks().iter().find(|t| t.title == "Read book").unwrap().id.clone();
        assert!(c.toggle_status(&id).await);

        let request = c.set_search("READ");
        c.settle(request).await;
        assert_eq!(c.visible_tasks().len(), 1);

        let request = c.set_filter(TaskFilter::Completed);
        c.settle(request).await;
        let titles: Vec<&str> = c.visible_tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Read book"]);

        let request = c.set_search("");
        c.settle(request).await;
        assert_eq!(c.visible_tasks().len(), 1);
        assert_eq!(c.stats().total, 2);
        assert!(c.is_narrowed());
    }
}
