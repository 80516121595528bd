use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque task identifier issued by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }

    /// High and urgent tasks both count as high priority
    pub fn is_high(&self) -> bool {
        matches!(self, Priority::High | Priority::Urgent)
    }

    /// Next value in selector order, wrapping around
    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|p| p == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ALL.iter().position(|p| p == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("Unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::InProgress, Status::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
        }
    }

    /// Checkbox semantics: completed goes back to pending, anything else completes
    pub fn toggled(&self) -> Self {
        match self {
            Status::Completed => Status::Pending,
            Status::Pending | Status::InProgress => Status::Completed,
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "in-progress" | "in_progress" | "inprogress" => Ok(Status::InProgress),
            "completed" | "done" => Ok(Status::Completed),
            other => Err(format!("Unknown status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub owner: String,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    /// Due strictly before `today` and not yet completed
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => due < today && !self.is_completed(),
            None => false,
        }
    }

    /// Case-insensitive substring match over title and description.
    /// An empty (or whitespace) needle matches every task.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

/// Field values staged by the add/edit form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub name: String,
    pub tags: String,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            status: task.status,
            due_date: task.due_date,
            name: task.name.clone(),
            tags: task.tags.clone(),
        }
    }
}

/// Partial update: only `Some` fields are written.
/// `due_date: Some(None)` clears the deadline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due_date: Option<Option<NaiveDate>>,
    pub name: Option<String>,
    pub tags: Option<String>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that overwrites every editable field with the draft's values
    pub fn from_draft(draft: TaskDraft) -> Self {
        Self {
            title: Some(draft.title),
            description: Some(draft.description),
            priority: Some(draft.priority),
            status: Some(draft.status),
            due_date: Some(draft.due_date),
            name: Some(draft.name),
            tags: Some(draft.tags),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the provided fields into `task`. Timestamps are left to the caller.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(ref title) = self.title {
            task.title = title.clone();
        }
        if let Some(ref description) = self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(ref name) = self.name {
            task.name = name.clone();
        }
        if let Some(ref tags) = self.tags {
            task.tags = tags.clone();
        }
    }
}

/// Backend-side query parameters for `fetch_tasks`
#[derive(Debug, Clone, PartialEq)]
pub struct FetchCriteria {
    pub search: Option<String>,
    /// `None` means every status ("all")
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub limit: u32,
    pub offset: u32,
}

pub const DEFAULT_FETCH_LIMIT: u32 = 100;

impl Default for FetchCriteria {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            priority: None,
            limit: DEFAULT_FETCH_LIMIT,
            offset: 0,
        }
    }
}

/// List filter selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Pending,
    InProgress,
    Completed,
    HighPriority,
    Overdue,
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 6] = [
        TaskFilter::All,
        TaskFilter::Pending,
        TaskFilter::InProgress,
        TaskFilter::Completed,
        TaskFilter::HighPriority,
        TaskFilter::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Pending => "pending",
            TaskFilter::InProgress => "in-progress",
            TaskFilter::Completed => "completed",
            TaskFilter::HighPriority => "high-priority",
            TaskFilter::Overdue => "overdue",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskFilter::All => "All Tasks",
            TaskFilter::Pending => "Pending",
            TaskFilter::InProgress => "In Progress",
            TaskFilter::Completed => "Completed",
            TaskFilter::HighPriority => "High Priority",
            TaskFilter::Overdue => "Overdue",
        }
    }

    pub fn admits(&self, task: &Task, today: NaiveDate) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Pending => task.status == Status::Pending,
            TaskFilter::InProgress => task.status == Status::InProgress,
            TaskFilter::Completed => task.status == Status::Completed,
            TaskFilter::HighPriority => task.priority.is_high(),
            TaskFilter::Overdue => task.is_overdue(today),
        }
    }

    pub fn next(&self) -> Self {
        let idx = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        let idx = Self::ALL.iter().position(|f| f == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| format!("Unknown filter: {}", s.trim()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
}

impl TaskStats {
    pub fn from_tasks(tasks: &[Task], today: NaiveDate) -> Self {
        Self {
            total: tasks.len(),
            completed: tasks.iter().filter(|t| t.status == Status::Completed).count(),
            pending: tasks.iter().filter(|t| t.status == Status::Pending).count(),
            overdue: tasks.iter().filter(|t| t.is_overdue(today)).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn task(title: &str, status: Status, priority: Priority, due: Option<NaiveDate>) -> Task {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        Task {
            id: TaskId::new(title),
            title: title.to_string(),
            description: String::new(),
            priority,
            status,
            due_date: due,
            created_at: at,
            updated_at: at,
            completed_at: None,
            name: String::new(),
            tags: String::new(),
            owner: String::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn enums_use_wire_spelling() {
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"in-progress\"");
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"urgent\"");
        assert_eq!("In-Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert!("someday".parse::<Priority>().is_err());
    }

    #[test]
    fn toggle_never_lands_on_in_progress() {
        assert_eq!(Status::Pending.toggled(), Status::Completed);
        assert_eq!(Status::InProgress.toggled(), Status::Completed);
        assert_eq!(Status::Completed.toggled(), Status::Pending);
    }

    #[test]
    fn overdue_is_strictly_before_today_and_open() {
        let today = date(2024, 6, 10);
        assert!(task("a", Status::Pending, Priority::Low, Some(date(2024, 6, 9))).is_overdue(today));
        assert!(!task("b", Status::Pending, Priority::Low, Some(today)).is_overdue(today));
        assert!(!task("c", Status::Completed, Priority::Low, Some(date(2024, 6, 1))).is_overdue(today));
        assert!(!task("d", Status::InProgress, Priority::Low, None).is_overdue(today));
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let mut t = task("Write Report", Status::Pending, Priority::Medium, None);
        t.description = "Quarterly NUMBERS".to_string();
        assert!(t.matches_search("report"));
        assert!(t.matches_search("numbers"));
        assert!(t.matches_search("   "));
        assert!(!t.matches_search("invoice"));
    }

    #[test]
    fn high_priority_filter_includes_urgent() {
        let today = date(2024, 6, 10);
        let urgent = task("u", Status::Pending, Priority::Urgent, None);
        let medium = task("m", Status::Pending, Priority::Medium, None);
        assert!(TaskFilter::HighPriority.admits(&urgent, today));
        assert!(!TaskFilter::HighPriority.admits(&medium, today));
    }

    #[test]
    fn filter_parses_selector_values() {
        for filter in TaskFilter::ALL {
            assert_eq!(filter.as_str().parse::<TaskFilter>().unwrap(), filter);
        }
        assert_eq!(TaskFilter::Overdue.next(), TaskFilter::All);
        assert_eq!(TaskFilter::All.prev(), TaskFilter::Overdue);
    }

    #[test]
    fn stats_count_over_whole_collection() {
        let today = date(2024, 6, 10);
        let tasks = vec![
            task("a", Status::Pending, Priority::High, Some(date(2024, 6, 1))),
            task("b", Status::Completed, Priority::Low, Some(date(2024, 6, 1))),
            task("c", Status::InProgress, Priority::Low, None),
        ];
        let stats = TaskStats::from_tasks(&tasks, today);
        assert_eq!(
            stats,
            TaskStats { total: 3, completed: 1, pending: 1, overdue: 1 }
        );
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut t = task("Original", Status::Pending, Priority::Low, Some(date(2024, 1, 1)));
        let patch = TaskPatch {
            title: Some("Renamed".to_string()),
            due_date: Some(None),
            ..TaskPatch::default()
        };
        patch.apply_to(&mut t);
        assert_eq!(t.title, "Renamed");
        assert_eq!(t.due_date, None);
        assert_eq!(t.priority, Priority::Low);
        assert!(TaskPatch::default().is_empty());
    }
}
