//! Shared state container that keeps the raw task collection and list inputs in one place.
//!
//! All changes go through [`TaskStore::apply`]; the derived list is never stored here and
//! is recomputed by [`crate::view::derive`] after every accepted action.

use std::time::{Duration, Instant};

use crate::error::TaskError;
use crate::model::{ListFilters, SortKey, Task, TaskFilter, TaskPatch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(TaskError),
}

/// Why a fetch-all was issued. Reconciling fetches never replace a loaded list with an
/// error panel; their failures become notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPurpose {
    Load,
    Reconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub created_at: Instant,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Info,
            created_at: Instant::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
            created_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    ToggleComplete,
    Edit,
    Delete,
    AddSubtask,
    ToggleSubtask,
    EditSubtask,
    DeleteSubtask,
    CompleteSubtasks,
}

impl MutationKind {
    pub fn label(&self) -> &'static str {
        match self {
            MutationKind::Create => "add task",
            MutationKind::ToggleComplete => "toggle completion",
            MutationKind::Edit => "save task",
            MutationKind::Delete => "delete task",
            MutationKind::AddSubtask => "add subtask",
            MutationKind::ToggleSubtask => "toggle subtask",
            MutationKind::EditSubtask => "rename subtask",
            MutationKind::DeleteSubtask => "delete subtask",
            MutationKind::CompleteSubtasks => "complete subtasks",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchStarted {
        seq: u64,
        purpose: FetchPurpose,
    },
    FetchSucceeded {
        seq: u64,
        tasks: Vec<Task>,
        rejected: usize,
    },
    FetchFailed {
        seq: u64,
        purpose: FetchPurpose,
        error: TaskError,
    },
    Misconfigured(TaskError),
    SearchChanged(String),
    FilterChanged(TaskFilter),
    TagChanged(Option<String>),
    SortChanged(SortKey),
    ShowCompletedChanged(bool),
    TaskSelected(Option<String>),
    BulkToggled(String),
    BulkCleared,
    PatchApplied { id: String, patch: TaskPatch },
    TaskRestored(Task),
    TaskRemoved { id: String },
    MutationQueued(MutationKind),
    MutationConfirmed(MutationKind),
    MutationFailed { kind: MutationKind, error: TaskError },
    NoticeDismissed,
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks: Vec<Task>,
    filters: ListFilters,
    load: LoadState,
    refreshing: bool,
    selected: Option<String>,
    bulk: Vec<String>,
    notice: Option<Notice>,
    pending_mutations: usize,
    fetch_issued: u64,
    fetch_applied: u64,
    version: u64,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            filters: ListFilters::default(),
            load: LoadState::Idle,
            refreshing: false,
            selected: None,
            bulk: Vec::new(),
            notice: None,
            pending_mutations: 0,
            fetch_issued: 0,
            fetch_applied: 0,
            version: 0,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn filters(&self) -> &ListFilters {
        &self.filters
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.selected.as_deref().and_then(|id| self.task(id))
    }

    /// Bulk-selected ids in the order they were picked.
    pub fn bulk_selection(&self) -> &[String] {
        &self.bulk
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn pending_mutations(&self) -> usize {
        self.pending_mutations
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Allocate the next fetch sequence number and mark the fetch as started.
    pub fn begin_fetch(&mut self, purpose: FetchPurpose) -> u64 {
        self.fetch_issued += 1;
        let seq = self.fetch_issued;
        self.apply(Action::FetchStarted { seq, purpose });
        seq
    }

    /// Drop a notice older than `ttl`.
    pub fn prune_notice(&mut self, ttl: Duration) {
        if self
            .notice
            .as_ref()
            .map(|notice| notice.created_at.elapsed() >= ttl)
            .unwrap_or(false)
        {
            self.apply(Action::NoticeDismissed);
        }
    }

    /// Reduce one action into the state. Returns `false` when the action was stale
    /// or referred to something that no longer exists, leaving the state untouched.
    pub fn apply(&mut self, action: Action) -> bool {
        let accepted = match action {
            Action::FetchStarted { seq, purpose } => {
                if purpose == FetchPurpose::Load && self.load != LoadState::Ready {
                    self.load = LoadState::Loading;
                }
                self.refreshing = seq == self.fetch_issued;
                true
            }
            Action::FetchSucceeded {
                seq,
                tasks,
                rejected,
            } => {
                if !self.accepts_fetch(seq) {
                    return false;
                }
                self.tasks = tasks;
                self.load = LoadState::Ready;
                self.prune_selection();
                if rejected > 0 {
                    self.notice = Some(Notice::error(format!(
                        "Skipped {} malformed task{}",
                        rejected,
                        if rejected == 1 { "" } else { "s" }
                    )));
                }
                true
            }
            Action::FetchFailed {
                seq,
                purpose,
                error,
            } => {
                if !self.accepts_fetch(seq) {
                    return false;
                }
                match (purpose, &self.load) {
                    (FetchPurpose::Reconcile, LoadState::Ready) => {
                        self.notice =
                            Some(Notice::error(format!("Could not refresh tasks: {error}")));
                    }
                    _ => self.load = LoadState::Failed(error),
                }
                true
            }
            Action::Misconfigured(error) => {
                self.load = LoadState::Failed(error);
                true
            }
            Action::SearchChanged(query) => {
                self.filters.search = query;
                true
            }
            Action::FilterChanged(filter) => {
                self.filters.filter = filter;
                true
            }
            Action::TagChanged(tag) => {
                self.filters.tag = tag.filter(|tag| !tag.is_empty());
                true
            }
            Action::SortChanged(sort) => {
                self.filters.sort = sort;
                true
            }
            Action::ShowCompletedChanged(show) => {
                self.filters.show_completed = show;
                true
            }
            Action::TaskSelected(id) => match id {
                Some(id) if self.task(&id).is_none() => false,
                other => {
                    self.selected = other;
                    true
                }
            },
            Action::BulkToggled(id) => {
                if let Some(position) = self.bulk.iter().position(|existing| existing == &id) {
                    self.bulk.remove(position);
                    true
                } else if self.task(&id).is_some() {
                    self.bulk.push(id);
                    true
                } else {
                    false
                }
            }
            Action::BulkCleared => {
                self.bulk.clear();
                true
            }
            Action::PatchApplied { id, patch } => {
                match self.tasks.iter_mut().find(|task| task.id == id) {
                    Some(task) => {
                        patch.apply_to(task);
                        true
                    }
                    None => false,
                }
            }
            Action::TaskRestored(previous) => {
                match self.tasks.iter_mut().find(|task| task.id == previous.id) {
                    Some(task) => {
                        *task = previous;
                        true
                    }
                    None => false,
                }
            }
            Action::TaskRemoved { id } => {
                let before = self.tasks.len();
                self.tasks.retain(|task| task.id != id);
                if self.selected.as_deref() == Some(id.as_str()) {
                    self.selected = None;
                }
                self.bulk.retain(|existing| existing != &id);
                self.tasks.len() != before
            }
            Action::MutationQueued(kind) => {
                self.pending_mutations += 1;
                self.notice = Some(Notice::info(format!("Queued {}…", kind.label())));
                true
            }
            Action::MutationConfirmed(kind) => {
                self.pending_mutations = self.pending_mutations.saturating_sub(1);
                self.notice = Some(Notice::info(format!(
                    "{} succeeded",
                    capitalize(kind.label())
                )));
                true
            }
            Action::MutationFailed { kind, error } => {
                self.pending_mutations = self.pending_mutations.saturating_sub(1);
                self.notice = Some(Notice::error(format!(
                    "Could not {}: {}",
                    kind.label(),
                    error
                )));
                true
            }
            Action::NoticeDismissed => {
                self.notice = None;
                true
            }
        };

        if accepted {
            self.version = self.version.wrapping_add(1);
        }
        accepted
    }

    fn accepts_fetch(&mut self, seq: u64) -> bool {
        if seq < self.fetch_applied {
            return false;
        }
        self.fetch_applied = seq;
        if seq == self.fetch_issued {
            self.refreshing = false;
        }
        true
    }

    fn prune_selection(&mut self) {
        let tasks = &self.tasks;
        if let Some(selected) = &self.selected {
            if !tasks.iter().any(|task| &task.id == selected) {
                self.selected = None;
            }
        }
        self.bulk
            .retain(|id| tasks.iter().any(|task| &task.id == id));
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
