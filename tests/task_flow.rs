use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use taskflow::clock::{Clock, FixedClock};
use taskflow::controller::{MSG_TITLE_REQUIRED, Notice, TaskListController};
use taskflow::models::{FetchCriteria, Priority, Status, TaskDraft, TaskFilter, TaskId};
use taskflow::service::{ServiceError, TaskService};
use taskflow::store::{
    FetchResponse, GetResponse, LocalStore, MutationResponse, Query, RecordClient, RecordInput,
    StoreError,
};

/// Local store that counts every backend call
struct CountingClient {
    inner: LocalStore,
    calls: AtomicUsize,
}

impl CountingClient {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordClient for CountingClient {
    async fn fetch_records(&self, table: &str, query: &Query) -> Result<FetchResponse, StoreError> {
        self.hit();
        self.inner.fetch_records(table, query).await
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: &str,
        fields: &[String],
    ) -> Result<GetResponse, StoreError> {
        self.hit();
        self.inner.get_record_by_id(table, id, fields).await
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError> {
        self.hit();
        self.inner.create_records(table, records).await
    }

    async fn update_records(
        &self,
        table: &str,
        records: Vec<RecordInput>,
    ) -> Result<MutationResponse, StoreError> {
        self.hit();
        self.inner.update_records(table, records).await
    }

    async fn delete_records(
        &self,
        table: &str,
        ids: Vec<String>,
    ) -> Result<MutationResponse, StoreError> {
        self.hit();
        self.inner.delete_records(table, ids).await
    }

    fn describe(&self) -> String {
        "counting".to_string()
    }
}

struct Harness {
    clock: Arc<FixedClock>,
    client: Arc<CountingClient>,
    service: Arc<TaskService>,
}

fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 10, 9, 30, 0).unwrap()));
    let client = Arc::new(CountingClient {
        inner: LocalStore::open_in_memory(clock.clone()).unwrap(),
        calls: AtomicUsize::new(0),
    });
    let service = Arc::new(TaskService::new(client.clone(), "tasks", clock.clone()));
    Harness { clock, client, service }
}

async fn signed_in(service: &Arc<TaskService>) -> TaskListController {
    let mut controller = TaskListController::new(service.clone());
    let request = controller.set_authenticated(true);
    controller.settle(request).await;
    controller
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn blank_title_makes_no_backend_call() {
    let h = harness();
    let mut controller = signed_in(&h.service).await;
    let before = h.client.calls();

    controller.open_create_form();
    controller.form_mut().unwrap().title = "   ".to_string();
    assert!(!controller.submit_form().await);

    assert_eq!(h.client.calls(), before);
    assert!(controller.tasks().is_empty());
    assert!(controller.form().is_some());
    assert_eq!(controller.take_notices(), vec![Notice::error(MSG_TITLE_REQUIRED)]);
}

#[tokio::test]
async fn overdue_report_scenario() {
    let h = harness();
    let mut controller = signed_in(&h.service).await;
    let yesterday = h.clock.today() - Duration::days(1);

    controller.open_create_form();
    {
        let form = controller.form_mut().unwrap();
        form.title = "Write report".to_string();
        form.priority = Priority::High;
        form.status = Status::Pending;
        form.due_date = yesterday.format("%Y-%m-%d").to_string();
    }
    assert!(controller.submit_form().await);
    assert_eq!(controller.stats().overdue, 1);

    let id = controller.tasks()[0].id.clone();
    h.clock.advance(Duration::minutes(5));
    assert!(controller.toggle_status(&id).await);

    assert_eq!(controller.stats().overdue, 0);
    let task = controller.task(&id).unwrap();
    assert_eq!(task.status, Status::Completed);
    assert_eq!(task.completed_at, Some(h.clock.now()));
}

#[tokio::test]
async fn toggling_twice_restores_status_and_clears_completion() {
    let h = harness();
    let created = h.service.create_task(TaskDraft::new("Buy milk")).await.unwrap();
    let mut controller = signed_in(&h.service).await;

    controller.toggle_status(&created.id).await;
    assert!(controller.task(&created.id).unwrap().completed_at.is_some());
    controller.toggle_status(&created.id).await;

    let task = controller.task(&created.id).unwrap();
    assert_eq!(task.status, Status::Pending);
    assert_eq!(task.completed_at, None);
}

#[tokio::test]
async fn completed_at_tracks_status_for_every_task() {
    let h = harness();
    for (title, status) in [
        ("a", Status::Pending),
        ("b", Status::InProgress),
        ("c", Status::Completed),
    ] {
        let draft = TaskDraft { status, ..TaskDraft::new(title) };
        h.service.create_task(draft).await.unwrap();
    }
    h.service
        .update_task(&TaskId::from("2"), taskflow::models::TaskPatch::status(Status::Completed))
        .await
        .unwrap();
    h.service
        .update_task(&TaskId::from("3"), taskflow::models::TaskPatch::status(Status::InProgress))
        .await
        .unwrap();

    let tasks = h.service.fetch_tasks(&FetchCriteria::default()).await.unwrap();
    assert_eq!(tasks.len(), 3);
    for task in tasks {
        assert_eq!(task.status == Status::Completed, task.completed_at.is_some(), "{}", task.title);
    }
}

#[tokio::test]
async fn overdue_filter_selects_past_due_open_tasks() {
    let h = harness();
    let today = h.clock.today();
    let fixtures = [
        ("late pending", Status::Pending, Some(today - Duration::days(3))),
        ("late in progress", Status::InProgress, Some(today - Duration::days(1))),
        ("late but done", Status::Completed, Some(today - Duration::days(2))),
        ("due today", Status::Pending, Some(today)),
        ("future", Status::InProgress, Some(today + Duration::days(4))),
        ("no date", Status::Pending, None),
    ];
    for (title, status, due_date) in fixtures {
        let draft = TaskDraft { status, due_date, ..TaskDraft::new(title) };
        h.service.create_task(draft).await.unwrap();
    }

    let mut controller = signed_in(&h.service).await;
    let request = controller.set_filter(TaskFilter::Overdue);
    controller.settle(request).await;

    let mut titles: Vec<&str> = controller.visible_tasks().iter().map(|t| t.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["late in progress", "late pending"]);
    assert_eq!(controller.stats().total, 6);
}

#[tokio::test]
async fn search_is_case_insensitive_over_title_and_description() {
    let h = harness();
    h.service.create_task(TaskDraft::new("Quarterly REPORT")).await.unwrap();
    let draft = TaskDraft {
        description: "attach the report appendix".to_string(),
        ..TaskDraft::new("Email finance")
    };
    h.service.create_task(draft).await.unwrap();
    h.service.create_task(TaskDraft::new("Buy milk")).await.unwrap();

    let mut controller = signed_in(&h.service).await;
    let request = controller.set_search("Report");
    controller.settle(request).await;
    assert_eq!(controller.visible_tasks().len(), 2);

    let request = controller.set_search("");
    controller.settle(request).await;
    assert_eq!(controller.visible_tasks().len(), 3);

    // Backend-side search agrees with the local match
    let criteria = FetchCriteria { search: Some("REPORT".to_string()), ..FetchCriteria::default() };
    assert_eq!(h.service.fetch_tasks(&criteria).await.unwrap().len(), 2);
}

#[tokio::test]
async fn created_task_round_trips_visible_fields() {
    let h = harness();
    let draft = TaskDraft {
        title: "Plan sprint".to_string(),
        description: "Collect estimates".to_string(),
        priority: Priority::Urgent,
        status: Status::InProgress,
        due_date: Some(date(2024, 6, 14)),
        name: String::new(),
        tags: "work,planning".to_string(),
    };
    h.service.create_task(draft.clone()).await.unwrap();

    let tasks = h.service.fetch_tasks(&FetchCriteria::default()).await.unwrap();
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.title, draft.title);
    assert_eq!(task.description, draft.description);
    assert_eq!(task.priority, draft.priority);
    assert_eq!(task.status, draft.status);
    assert_eq!(task.due_date, draft.due_date);
    assert_eq!(task.tags, draft.tags);
}

#[tokio::test]
async fn deleting_missing_id_is_descriptive_and_harmless() {
    let h = harness();
    h.service.create_task(TaskDraft::new("Keep me")).await.unwrap();

    let err = h.service.delete_task(&TaskId::from("404")).await.unwrap_err();
    assert_eq!(err, ServiceError::Rejected("Record not found".to_string()));

    let tasks = h.service.fetch_tasks(&FetchCriteria::default()).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Keep me");
}

#[tokio::test]
async fn local_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("taskflow.db");
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()));

    {
        let store = LocalStore::open(&path, clock.clone()).unwrap();
        let service = TaskService::new(Arc::new(store), "tasks", clock.clone());
        service.create_task(TaskDraft::new("Persist me")).await.unwrap();
    }

    let store = LocalStore::open(&path, clock.clone()).unwrap();
    let service = TaskService::new(Arc::new(store), "tasks", clock);
    let tasks = service.fetch_tasks(&FetchCriteria::default()).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Persist me");
}
