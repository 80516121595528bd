//! Task service: the single place where UI tasks and backend records meet.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::models::{FetchCriteria, Priority, Status, Task, TaskDraft, TaskId, TaskPatch};
use crate::store::{
    Condition, GroupOperator, MutationResponse, MutationResult, Operator, OrderBy, PagingInfo,
    Query, Record, RecordClient, RecordInput, SortType, SubGroup, WhereGroup,
};

/// Every field of the task table
pub const ALL_FIELDS: [&str; 15] = [
    "Name",
    "Tags",
    "Owner",
    "CreatedOn",
    "CreatedBy",
    "ModifiedOn",
    "ModifiedBy",
    "title",
    "description",
    "priority",
    "due_date",
    "status",
    "created_at",
    "updated_at",
    "completed_at",
];

/// Fields the client may write on create and update
pub const UPDATEABLE_FIELDS: [&str; 11] = [
    "Name",
    "Tags",
    "Owner",
    "title",
    "description",
    "priority",
    "due_date",
    "status",
    "created_at",
    "updated_at",
    "completed_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// User-facing service failures. The message is shown as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("Failed to fetch tasks. Please try again.")]
    FetchFailed,
    #[error("Failed to fetch task. Please try again.")]
    FetchOneFailed,
    /// Backend refused the write; carries its explanation
    #[error("{0}")]
    Rejected(String),
    #[error("Failed to {0} task")]
    Failed(Operation),
    #[error("Task not found")]
    NotFound(TaskId),
    /// Caught before any backend call
    #[error("Please enter a task title")]
    MissingTitle,
}

pub struct TaskService {
    client: Arc<dyn RecordClient>,
    table: String,
    clock: Arc<dyn Clock>,
}

impl TaskService {
    pub fn new(client: Arc<dyn RecordClient>, table: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            table: table.into(),
            clock,
        }
    }

    pub fn backend_label(&self) -> String {
        self.client.describe()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn fetch_tasks(&self, criteria: &FetchCriteria) -> Result<Vec<Task>, ServiceError> {
        let query = build_query(criteria);
        let resp = self
            .client
            .fetch_records(&self.table, &query)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Error fetching tasks");
                ServiceError::FetchFailed
            })?;
        if !resp.success {
            tracing::error!(message = ?resp.message, "Fetch rejected by backend");
            return Err(ServiceError::FetchFailed);
        }
        let now = self.clock.now();
        Ok(resp
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|r| task_from_record(r, now))
            .collect())
    }

    pub async fn get_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, ServiceError> {
        let record = self.fetch_record(id).await.map_err(|e| {
            tracing::error!(error = %e, id = %id, "Error fetching task");
            ServiceError::FetchOneFailed
        })?;
        let now = self.clock.now();
        Ok(record.map(|r| task_from_record(r, now)))
    }

    pub async fn create_task(&self, mut draft: TaskDraft) -> Result<Task, ServiceError> {
        draft.title = required_title(&draft.title)?;
        let now = self.clock.now();
        let completed_at = (draft.status == Status::Completed).then_some(now);
        let input = RecordInput {
            id: None,
            name: if draft.name.trim().is_empty() {
                draft.title.clone()
            } else {
                draft.name.clone()
            },
            tags: draft.tags,
            owner: String::new(),
            title: draft.title,
            description: draft.description,
            priority: draft.priority.as_str().to_string(),
            due_date: draft.due_date.map(format_date),
            status: draft.status.as_str().to_string(),
            created_at: format_timestamp(now),
            updated_at: format_timestamp(now),
            completed_at: completed_at.map(format_timestamp),
        };

        let resp = self
            .client
            .create_records(&self.table, vec![input])
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Error creating task");
                ServiceError::Failed(Operation::Create)
            })?;
        let record = successful_record(resp, Operation::Create)?;
        let task = task_from_record(record, now);
        tracing::info!(id = %task.id, "task created");
        Ok(task)
    }

    /// Merge `patch` into the stored task. `created_at` is preserved,
    /// `updated_at` is refreshed and `completed_at` follows the status.
    pub async fn update_task(&self, id: &TaskId, mut patch: TaskPatch) -> Result<Task, ServiceError> {
        if let Some(title) = patch.title.as_deref() {
            patch.title = Some(required_title(title)?);
        }
        let record = self.fetch_record(id).await.map_err(|e| {
            tracing::error!(error = %e, id = %id, "Error loading task for update");
            ServiceError::Failed(Operation::Update)
        })?;
        let Some(record) = record else {
            return Err(ServiceError::NotFound(id.clone()));
        };

        let now = self.clock.now();
        let mut task = task_from_record(record, now);
        let was_completed = task.is_completed();
        patch.apply_to(&mut task);
        task.updated_at = now;
        task.completed_at = match (was_completed, task.is_completed()) {
            (true, true) => task.completed_at.or(Some(now)),
            (false, true) => Some(now),
            (_, false) => None,
        };

        let mut input = record_input(&task);
        input.id = Some(id.to_string());
        let resp = self
            .client
            .update_records(&self.table, vec![input])
            .await
            .map_err(|e| {
                tracing::error!(error = %e, id = %id, "Error updating task");
                ServiceError::Failed(Operation::Update)
            })?;
        let record = successful_record(resp, Operation::Update)?;
        tracing::info!(id = %id, status = %task.status, "task updated");
        Ok(task_from_record(record, now))
    }

    pub async fn delete_task(&self, id: &TaskId) -> Result<(), ServiceError> {
        let resp = self
            .client
            .delete_records(&self.table, vec![id.to_string()])
            .await
            .map_err(|e| {
                tracing::error!(error = %e, id = %id, "Error deleting task");
                ServiceError::Failed(Operation::Delete)
            })?;
        let result = first_result(resp, Operation::Delete)?;
        if !result.success {
            return Err(rejection(result, Operation::Delete));
        }
        tracing::info!(id = %id, "task deleted");
        Ok(())
    }

    async fn fetch_record(&self, id: &TaskId) -> Result<Option<Record>, crate::store::StoreError> {
        let fields: Vec<String> = ALL_FIELDS.iter().map(|f| f.to_string()).collect();
        let resp = self
            .client
            .get_record_by_id(&self.table, id.as_str(), &fields)
            .await?;
        Ok(resp.data)
    }
}

/// Trimmed title, or `MissingTitle` when nothing is left
fn required_title(title: &str) -> Result<String, ServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::MissingTitle);
    }
    Ok(title.to_string())
}

/// Translate fetch criteria into a record query ordered newest first
pub fn build_query(criteria: &FetchCriteria) -> Query {
    let mut query = Query {
        fields: ALL_FIELDS.iter().map(|f| f.to_string()).collect(),
        order_by: vec![OrderBy {
            field_name: "created_at".to_string(),
            sort_type: SortType::Desc,
        }],
        paging_info: Some(PagingInfo {
            limit: criteria.limit,
            offset: criteria.offset,
        }),
        ..Query::default()
    };

    if let Some(search) = criteria.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query.where_groups.push(WhereGroup {
            operator: GroupOperator::Or,
            sub_groups: ["title", "description"]
                .iter()
                .map(|field| SubGroup {
                    conditions: vec![Condition::new(field, Operator::Contains, search)],
                    operator: String::new(),
                })
                .collect(),
        });
    }
    if let Some(status) = criteria.status {
        query
            .conditions
            .push(Condition::new("status", Operator::ExactMatch, status.as_str()));
    }
    if let Some(priority) = criteria.priority {
        query
            .conditions
            .push(Condition::new("priority", Operator::ExactMatch, priority.as_str()));
    }
    query
}

/// Read a backend record into a task, filling the documented defaults.
/// `completed_at` follows the status: rows that disagree are normalized.
pub fn task_from_record(record: Record, now: DateTime<Utc>) -> Task {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let created_at = non_empty(record.created_at)
        .or(non_empty(record.created_on))
        .and_then(|s| parse_timestamp(&s))
        .unwrap_or(now);
    let updated_at = non_empty(record.updated_at)
        .or(non_empty(record.modified_on))
        .and_then(|s| parse_timestamp(&s))
        .unwrap_or(now);
    let status = record
        .status
        .and_then(|s| s.parse::<Status>().ok())
        .unwrap_or_default();
    let completed_at = match status {
        Status::Completed => non_empty(record.completed_at)
            .and_then(|s| parse_timestamp(&s))
            .or(Some(updated_at)),
        Status::Pending | Status::InProgress => None,
    };

    Task {
        id: TaskId::new(record.id),
        title: record.title.unwrap_or_default(),
        description: record.description.unwrap_or_default(),
        priority: record
            .priority
            .and_then(|p| p.parse::<Priority>().ok())
            .unwrap_or_default(),
        status,
        due_date: non_empty(record.due_date).and_then(|s| parse_due_date(&s)),
        created_at,
        updated_at,
        completed_at,
        name: record.name,
        tags: record.tags,
        owner: record.owner,
    }
}

/// Write the updateable fields of `task` in backend naming
pub fn record_input(task: &Task) -> RecordInput {
    RecordInput {
        id: None,
        name: if task.name.trim().is_empty() {
            task.title.clone()
        } else {
            task.name.clone()
        },
        tags: task.tags.clone(),
        owner: task.owner.clone(),
        title: task.title.clone(),
        description: task.description.clone(),
        priority: task.priority.as_str().to_string(),
        due_date: task.due_date.map(format_date),
        status: task.status.as_str().to_string(),
        created_at: format_timestamp(task.created_at),
        updated_at: format_timestamp(task.updated_at),
        completed_at: task.completed_at.map(format_timestamp),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Due dates arrive either as `YYYY-MM-DD` or as a full timestamp
fn parse_due_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|dt| dt.date_naive()))
}

fn first_result(resp: MutationResponse, op: Operation) -> Result<MutationResult, ServiceError> {
    if !resp.success {
        return Err(match resp.message {
            Some(message) if !message.trim().is_empty() => ServiceError::Rejected(message),
            _ => ServiceError::Failed(op),
        });
    }
    resp.results
        .into_iter()
        .next()
        .ok_or(ServiceError::Failed(op))
}

fn successful_record(resp: MutationResponse, op: Operation) -> Result<Record, ServiceError> {
    let result = first_result(resp, op)?;
    if !result.success {
        return Err(rejection(result, op));
    }
    result.data.ok_or(ServiceError::Failed(op))
}

/// Field errors joined as "label: message", else the backend message
fn rejection(result: MutationResult, op: Operation) -> ServiceError {
    if !result.errors.is_empty() {
        let joined = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field_label, e.message))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!(operation = %op, errors = %joined, "write rejected");
        return ServiceError::Rejected(joined);
    }
    match result.message {
        Some(message) if !message.trim().is_empty() => {
            tracing::warn!(operation = %op, message = %message, "write rejected");
            ServiceError::Rejected(message)
        }
        _ => ServiceError::Failed(op),
    }
}
