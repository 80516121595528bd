use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::{BackendKind, Config};
use crate::models::{FetchCriteria, Priority, Status, Task, TaskDraft, TaskFilter, TaskId, TaskPatch, TaskStats};
use crate::service::{ServiceError, TaskService};
use crate::store::{LocalStore, RecordClient, RemoteStore, StoreError};
use crate::utils::{format_due_date, parse_date};

#[derive(Parser)]
#[command(name = "taskflow")]
#[command(about = "TaskFlow - Organize Your Work from the terminal")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (separate config and database)
    #[arg(long)]
    pub dev: bool,

    /// Override the configured storage backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch interactive TUI (default if no subcommand)
    Tui {
        /// Initial route, e.g. "/" or "/tasks"
        #[arg(long, default_value = "/")]
        route: String,
    },
    /// Add a new task
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// low, medium, high or urgent
        #[arg(long)]
        priority: Option<Priority>,
        /// pending, in-progress or completed
        #[arg(long)]
        status: Option<Status>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List tasks
    List {
        /// all, pending, in-progress, completed, high-priority or overdue
        #[arg(long, default_value = "all")]
        filter: TaskFilter,
        /// Case-insensitive match on title or description
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long, default_value_t = crate::models::DEFAULT_FETCH_LIMIT)]
        limit: u32,
    },
    /// Show one task
    Show { id: String },
    /// Change fields of a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<Status>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Flip a task between completed and pending
    Toggle { id: String },
    /// Delete a task
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Show task counters
    Stats,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("Nothing to change")]
    EmptyPatch,
    #[error("Not signed in. Set a session token for the remote backend.")]
    SignedOut,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pick the record client for the configured backend
pub fn build_client(config: &Config, clock: Arc<dyn Clock>) -> Result<Arc<dyn RecordClient>, StoreError> {
    match config.backend {
        BackendKind::Local => {
            let path = config.get_database_path();
            tracing::info!(path = %path.display(), "opening local store");
            Ok(Arc::new(LocalStore::open(&path, clock)?))
        }
        BackendKind::Remote => {
            config.remote.validate()?;
            tracing::info!(endpoint = %config.remote.endpoint, "using remote store");
            Ok(Arc::new(RemoteStore::new(config.remote.clone())?))
        }
    }
}

/// Whether a signed-in session exists for the configured backend
pub fn is_signed_in(config: &Config) -> bool {
    match config.backend {
        BackendKind::Local => true,
        BackendKind::Remote => config.remote.has_session(),
    }
}

fn parse_due(due: Option<&str>) -> Result<Option<chrono::NaiveDate>, CliError> {
    match due.map(str::trim).filter(|d| !d.is_empty()) {
        Some(d) => parse_date(d).map(Some).map_err(|e| CliError::DateParseError(format!("{} ({})", d, e))),
        None => Ok(None),
    }
}

fn print_task_line(out: &mut dyn Write, task: &Task, today: chrono::NaiveDate) -> Result<(), CliError> {
    let checkbox = if task.is_completed() { "[x]" } else { "[ ]" };
    let due = match task.due_date {
        Some(d) if task.is_overdue(today) => format!("  due {} (overdue)", format_due_date(d, today)),
        Some(d) => format!("  due {}", format_due_date(d, today)),
        None => String::new(),
    };
    writeln!(
        out,
        "{} {:>4}  {:<40} {:<8} {:<12}{}",
        checkbox,
        task.id,
        task.title,
        task.priority.label(),
        task.status.label(),
        due
    )?;
    Ok(())
}

fn print_task_detail(out: &mut dyn Write, task: &Task, today: chrono::NaiveDate) -> Result<(), CliError> {
    writeln!(out, "ID:          {}", task.id)?;
    writeln!(out, "Title:       {}", task.title)?;
    if !task.description.is_empty() {
        writeln!(out, "Description: {}", task.description)?;
    }
    writeln!(out, "Priority:    {}", task.priority.label())?;
    writeln!(out, "Status:      {}", task.status.label())?;
    if let Some(due) = task.due_date {
        let marker = if task.is_overdue(today) { " (overdue)" } else { "" };
        writeln!(out, "Due:         {}{}", due.format("%Y-%m-%d"), marker)?;
    }
    if !task.tags.is_empty() {
        writeln!(out, "Tags:        {}", task.tags)?;
    }
    writeln!(out, "Created:     {}", task.created_at.format("%Y-%m-%d %H:%M"))?;
    writeln!(out, "Updated:     {}", task.updated_at.format("%Y-%m-%d %H:%M"))?;
    if let Some(done) = task.completed_at {
        writeln!(out, "Completed:   {}", done.format("%Y-%m-%d %H:%M"))?;
    }
    Ok(())
}

pub struct AddArgs {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due: Option<String>,
    pub tags: Option<String>,
}

/// Handle the add command
pub async fn handle_add(service: &TaskService, args: AddArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let draft = TaskDraft {
        title: args.title.trim().to_string(),
        description: args.description.unwrap_or_default(),
        priority: args.priority.unwrap_or_default(),
        status: args.status.unwrap_or_default(),
        due_date: parse_due(args.due.as_deref())?,
        name: String::new(),
        tags: args.tags.unwrap_or_default(),
    };
    let task = service.create_task(draft).await?;
    writeln!(out, "Task created successfully (ID: {})", task.id)?;
    Ok(())
}

pub struct ListArgs {
    pub filter: TaskFilter,
    pub search: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub limit: u32,
}

/// Handle the list command. Status, priority and search go to the backend;
/// the named filter narrows the result locally.
pub async fn handle_list(service: &TaskService, args: ListArgs, out: &mut dyn Write) -> Result<(), CliError> {
    let criteria = FetchCriteria {
        search: args.search.filter(|s| !s.trim().is_empty()),
        status: args.status,
        priority: args.priority,
        limit: args.limit,
        ..FetchCriteria::default()
    };
    let today = service.clock().today();
    let tasks: Vec<Task> = service
        .fetch_tasks(&criteria)
        .await?
        .into_iter()
        .filter(|t| args.filter.admits(t, today))
        .collect();

    if tasks.is_empty() {
        writeln!(out, "No tasks match your criteria")?;
        return Ok(());
    }
    for task in &tasks {
        print_task_line(out, task, today)?;
    }
    writeln!(out, "{} task(s)", tasks.len())?;
    Ok(())
}

pub async fn handle_show(service: &TaskService, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let task = service
        .get_task_by_id(&TaskId::from(id))
        .await?
        .ok_or_else(|| CliError::NotFound(id.to_string()))?;
    print_task_detail(out, &task, service.clock().today())
}

pub struct EditArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub tags: Option<String>,
}

pub async fn handle_edit(
    service: &TaskService,
    id: &str,
    args: EditArgs,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let due_date = if args.clear_due {
        Some(None)
    } else {
        parse_due(args.due.as_deref())?.map(Some)
    };
    let patch = TaskPatch {
        title: args.title.map(|t| t.trim().to_string()),
        description: args.description,
        priority: args.priority,
        status: args.status,
        due_date,
        name: None,
        tags: args.tags,
    };
    if patch.is_empty() {
        return Err(CliError::EmptyPatch);
    }
    let task = service.update_task(&TaskId::from(id), patch).await?;
    writeln!(out, "Task updated successfully (ID: {})", task.id)?;
    Ok(())
}

/// Completed becomes pending, anything else becomes completed
pub async fn handle_toggle(service: &TaskService, id: &str, out: &mut dyn Write) -> Result<(), CliError> {
    let task_id = TaskId::from(id);
    let task = service
        .get_task_by_id(&task_id)
        .await?
        .ok_or_else(|| CliError::NotFound(id.to_string()))?;
    let status = task.status.toggled();
    let updated = service.update_task(&task_id, TaskPatch::status(status)).await?;
    writeln!(out, "Task {} is now {}", updated.id, updated.status.label())?;
    Ok(())
}

/// Ask a yes/no question; anything but "y" or "yes" declines
pub fn prompt_confirm(question: &str, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<bool, CliError> {
    write!(out, "{} [y/N] ", question)?;
    out.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub async fn handle_delete(
    service: &TaskService,
    id: &str,
    confirmed: bool,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    if !confirmed {
        writeln!(out, "Delete cancelled")?;
        return Ok(());
    }
    service.delete_task(&TaskId::from(id)).await?;
    writeln!(out, "Task deleted successfully (ID: {})", id)?;
    Ok(())
}

pub async fn handle_stats(service: &TaskService, out: &mut dyn Write) -> Result<(), CliError> {
    let tasks = service
        .fetch_tasks(&FetchCriteria { limit: u32::MAX, ..FetchCriteria::default() })
        .await?;
    let stats = TaskStats::from_tasks(&tasks, service.clock().today());
    writeln!(out, "Total:     {}", stats.total)?;
    writeln!(out, "Completed: {}", stats.completed)?;
    writeln!(out, "Pending:   {}", stats.pending)?;
    writeln!(out, "Overdue:   {}", stats.overdue)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn service() -> TaskService {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap()));
        let store = LocalStore::open_in_memory(clock.clone()).unwrap();
        TaskService::new(Arc::new(store), "tasks", clock)
    }

    fn add_args(title: &str) -> AddArgs {
        AddArgs {
            title: title.to_string(),
            description: None,
            priority: None,
            status: None,
            due: None,
            tags: None,
        }
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from([
            "taskflow", "--backend", "remote", "list", "--filter", "high-priority", "--search", "report",
        ])
        .unwrap();
        assert_eq!(cli.backend, Some(BackendKind::Remote));
        match cli.command {
            Some(Commands::List { filter, search, .. }) => {
                assert_eq!(filter, TaskFilter::HighPriority);
                assert_eq!(search.as_deref(), Some("report"));
            }
            _ => panic!("expected list"),
        }
        assert!(Cli::try_parse_from(["taskflow", "edit", "1", "--due", "2024-01-01", "--clear-due"]).is_err());
    }

    #[tokio::test]
    async fn add_then_list_and_stats() {
        let service = service();
        let mut out = Vec::new();
        let mut args = add_args("Write report");
        args.priority = Some(Priority::High);
        args.due = Some("2024-06-01".to_string());
        handle_add(&service, args, &mut out).await.unwrap();
        handle_add(&service, add_args("Buy milk"), &mut out).await.unwrap();
        assert_eq!(
            text(out),
            "Task created successfully (ID: 1)\nTask created successfully (ID: 2)\n"
        );

        let mut out = Vec::new();
        let args = ListArgs {
            filter: TaskFilter::Overdue,
            search: None,
            status: None,
            priority: None,
            limit: 100,
        };
        handle_list(&service, args, &mut out).await.unwrap();
        let listing = text(out);
        assert!(listing.contains("Write report"));
        assert!(listing.contains("(overdue)"));
        assert!(!listing.contains("Buy milk"));

        let mut out = Vec::new();
        handle_stats(&service, &mut out).await.unwrap();
        assert_eq!(
            text(out),
            "Total:     2\nCompleted: 0\nPending:   2\nOverdue:   1\n"
        );
    }

    #[tokio::test]
    async fn bad_due_date_is_rejected_before_saving() {
        let service = service();
        let mut args = add_args("Write report");
        args.due = Some("next week".to_string());
        let err = handle_add(&service, args, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, CliError::DateParseError(_)));
        assert!(service.fetch_tasks(&FetchCriteria::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_flips_and_edit_requires_changes() {
        let service = service();
        handle_add(&service, add_args("Write report"), &mut Vec::new()).await.unwrap();

        let mut out = Vec::new();
        handle_toggle(&service, "1", &mut out).await.unwrap();
        handle_toggle(&service, "1", &mut out).await.unwrap();
        assert_eq!(text(out), "Task 1 is now Completed\nTask 1 is now Pending\n");

        let empty = EditArgs {
            title: None,
            description: None,
            priority: None,
            status: None,
            due: None,
            clear_due: false,
            tags: None,
        };
        let err = handle_edit(&service, "1", empty, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, CliError::EmptyPatch));

        let err = handle_show(&service, "99", &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, CliError::NotFound(_)));
    }

    #[tokio::test]
    async fn blank_titles_are_refused_on_add_and_edit() {
        let service = service();
        let err = handle_add(&service, add_args("   "), &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, CliError::Service(ServiceError::MissingTitle)));

        handle_add(&service, add_args("Write report"), &mut Vec::new()).await.unwrap();
        let blank = EditArgs {
            title: Some("  ".to_string()),
            description: None,
            priority: None,
            status: None,
            due: None,
            clear_due: false,
            tags: None,
        };
        let err = handle_edit(&service, "1", blank, &mut Vec::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter a task title");

        let padded = EditArgs {
            title: Some("  Write summary ".to_string()),
            description: None,
            priority: None,
            status: None,
            due: None,
            clear_due: false,
            tags: None,
        };
        handle_edit(&service, "1", padded, &mut Vec::new()).await.unwrap();
        let tasks = service.fetch_tasks(&FetchCriteria::default()).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Write summary");
    }

    #[test]
    fn prompt_accepts_only_yes() {
        let mut out = Vec::new();
        assert!(prompt_confirm("Delete task 1?", &mut "Y\n".as_bytes(), &mut out).unwrap());
        assert!(!prompt_confirm("Delete task 1?", &mut "\n".as_bytes(), &mut out).unwrap());
        assert!(!prompt_confirm("Delete task 1?", &mut "nope\n".as_bytes(), &mut out).unwrap());
        assert!(text(out).starts_with("Delete task 1? [y/N] "));
    }

    #[tokio::test]
    async fn delete_needs_confirmation() {
        let service = service();
        handle_add(&service, add_args("Write report"), &mut Vec::new()).await.unwrap();
        let mut out = Vec::new();
        handle_delete(&service, "1", false, &mut out).await.unwrap();
        assert_eq!(service.fetch_tasks(&FetchCriteria::default()).await.unwrap().len(), 1);
        handle_delete(&service, "1", true, &mut out).await.unwrap();
        assert!(service.fetch_tasks(&FetchCriteria::default()).await.unwrap().is_empty());
    }
}
