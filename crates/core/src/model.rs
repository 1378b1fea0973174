use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::None,
        Priority::Low,
        Priority::Medium,
        Priority::High,
    ];

    /// Total mapping from the wire integer; anything outside 0-3 means no priority.
    pub fn from_wire(value: i64) -> Self {
        match value {
            1 => Priority::Low,
            2 => Priority::Medium,
            3 => Priority::High,
            _ => Priority::None,
        }
    }

    pub fn to_wire(self) -> u8 {
        self.rank()
    }

    /// Ordinal used by the priority sort: High=3 down to None=0.
    pub fn rank(self) -> u8 {
        match self {
            Priority::None => 0,
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::None => "None",
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" | "" => Ok(Priority::None),
            "low" | "1" => Ok(Priority::Low),
            "medium" | "med" | "2" => Ok(Priority::Medium),
            "high" | "3" => Ok(Priority::High),
            other => Err(anyhow!(
                "Unknown priority '{}': expected none|low|medium|high or 0-3",
                other
            )),
        }
    }
}

impl ValueEnum for Priority {
    fn value_variants<'a>() -> &'a [Self] {
        &Priority::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

impl Subtask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            title: title.into(),
            completed: false,
        }
    }
}

/// Display form of a task: named priority and calendar due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub subtasks: Vec<Subtask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Task {
    pub fn subtask(&self, subtask_id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|subtask| subtask.id == subtask_id)
    }

    pub fn subtask_progress(&self) -> SubtaskProgress {
        SubtaskProgress::of(&self.subtasks)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubtaskProgress {
    pub total: usize,
    pub completed: usize,
    pub percent: u8,
}

impl SubtaskProgress {
    pub fn of(subtasks: &[Subtask]) -> Self {
        let total = subtasks.len();
        let completed = subtasks.iter().filter(|subtask| subtask.completed).count();
        Self {
            total,
            completed,
            percent: rounded_percent(completed, total),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}

pub(crate) fn rounded_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u8
}

/// Field-level change set applied optimistically and sent as the update body.
///
/// `None` leaves a field untouched; the nested options on `due_date` and
/// `project` distinguish "clear" (`Some(None)`) from "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub completed: Option<bool>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub project: Option<Option<String>>,
}

impl TaskPatch {
    pub fn completed(value: bool) -> Self {
        Self {
            completed: Some(value),
            ..Self::default()
        }
    }

    pub fn subtasks(subtasks: Vec<Subtask>) -> Self {
        Self {
            subtasks: Some(subtasks),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(subtasks) = &self.subtasks {
            task.subtasks = subtasks.clone();
        }
        if let Some(project) = &self.project {
            task.project = project.clone();
        }
    }
}

/// Input for creating a task through the remote API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskFilter {
    #[default]
    All,
    Completed,
    Pending,
    DueSoon,
    HighPriority,
    Priority(Priority),
}

impl TaskFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskFilter::All => "all",
            TaskFilter::Completed => "completed",
            TaskFilter::Pending => "pending",
            TaskFilter::DueSoon => "due-soon",
            TaskFilter::HighPriority => "high-priority",
            TaskFilter::Priority(priority) => priority.as_str(),
        }
    }
}

impl fmt::Display for TaskFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(TaskFilter::All),
            "completed" | "done" => Ok(TaskFilter::Completed),
            "pending" | "open" => Ok(TaskFilter::Pending),
            "due-soon" | "duesoon" | "due_soon" => Ok(TaskFilter::DueSoon),
            "high-priority" | "highpriority" | "high_priority" => Ok(TaskFilter::HighPriority),
            other => other
                .parse::<Priority>()
                .map(TaskFilter::Priority)
                .map_err(|_| {
                    anyhow!(
                        "Unknown filter '{}': expected all|completed|pending|due-soon|high-priority|none|low|medium|high",
                        other
                    )
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortKey {
    #[default]
    Date,
    Title,
    Priority,
    Completed,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::Title => "title",
            SortKey::Priority => "priority",
            SortKey::Completed => "completed",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" | "due" | "due-date" => Ok(SortKey::Date),
            "title" => Ok(SortKey::Title),
            "priority" => Ok(SortKey::Priority),
            "completed" | "status" => Ok(SortKey::Completed),
            other => Err(anyhow!(
                "Unknown sort key '{}': expected date|title|priority|completed",
                other
            )),
        }
    }
}

impl ValueEnum for SortKey {
    fn value_variants<'a>() -> &'a [Self] {
        const VARIANTS: [SortKey; 4] = [
            SortKey::Date,
            SortKey::Title,
            SortKey::Priority,
            SortKey::Completed,
        ];
        &VARIANTS
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// The user-controlled inputs of the derived list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilters {
    pub search: String,
    pub filter: TaskFilter,
    pub tag: Option<String>,
    pub sort: SortKey,
    pub show_completed: bool,
}

impl Default for ListFilters {
    fn default() -> Self {
        Self {
            search: String::new(),
            filter: TaskFilter::All,
            tag: None,
            sort: SortKey::Date,
            show_completed: true,
        }
    }
}
