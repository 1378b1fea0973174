//! Pure derivation of what the presentation layer shows from the store.

use chrono::NaiveDate;
use serde::Serialize;

use crate::filters::{self, DueStatus};
use crate::model::{rounded_percent, ListFilters, SubtaskProgress, Task};
use crate::sort;
use crate::store::{LoadState, Notice, TaskStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub due_today: usize,
    pub completion_percent: u8,
}

impl TaskStats {
    pub fn of(tasks: &[Task], today: NaiveDate) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|task| task.completed).count();
        let due_today = tasks
            .iter()
            .filter(|task| !task.completed && task.due_date == Some(today))
            .count();
        Self {
            total,
            completed,
            pending: total - completed,
            due_today,
            completion_percent: rounded_percent(completed, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub task: Task,
    pub due: DueStatus,
    pub subtasks: SubtaskProgress,
    pub bulk_selected: bool,
}

/// The list area is either loaded in full or replaced by a visible state; never partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListPanel {
    Idle,
    Loading,
    Ready(Vec<TaskRow>),
    Error { message: String, retryable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub panel: ListPanel,
    pub stats: TaskStats,
    pub tags: Vec<String>,
    pub filters: ListFilters,
    pub selected: Option<Task>,
    pub notice: Option<Notice>,
    pub refreshing: bool,
}

impl ViewModel {
    pub fn rows(&self) -> &[TaskRow] {
        match &self.panel {
            ListPanel::Ready(rows) => rows,
            _ => &[],
        }
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.rows().iter().map(|row| &row.task)
    }

    pub fn task_ids(&self) -> Vec<&str> {
        self.tasks().map(|task| task.id.as_str()).collect()
    }
}

/// Filter then sort, from scratch. The input collection is not modified.
pub fn derive_tasks(tasks: &[Task], filters: &ListFilters, today: NaiveDate) -> Vec<Task> {
    let predicates = filters::active_predicates(filters, today);
    let mut visible = filters::apply(tasks, &predicates);
    sort::sort_in_place(&mut visible, filters.sort);
    visible
}

pub fn derive(store: &TaskStore, today: NaiveDate) -> ViewModel {
    let panel = match store.load_state() {
        LoadState::Idle => ListPanel::Idle,
        LoadState::Loading => ListPanel::Loading,
        LoadState::Failed(error) => ListPanel::Error {
            message: error.to_string(),
            retryable: error.is_retryable(),
        },
        LoadState::Ready => {
            let bulk = store.bulk_selection();
            ListPanel::Ready(
                derive_tasks(store.tasks(), store.filters(), today)
                    .into_iter()
                    .map(|task| TaskRow {
                        due: filters::classify_due(&task, today),
                        subtasks: task.subtask_progress(),
                        bulk_selected: bulk.iter().any(|id| id == &task.id),
                        task,
                    })
                    .collect(),
            )
        }
    };

    let loaded = matches!(store.load_state(), LoadState::Ready);
    ViewModel {
        panel,
        stats: if loaded {
            TaskStats::of(store.tasks(), today)
        } else {
            TaskStats::default()
        },
        tags: if loaded {
            filters::tag_facets(store.tasks())
        } else {
            Vec::new()
        },
        filters: store.filters().clone(),
        selected: store.selected_task().cloned(),
        notice: store.notice().cloned(),
        refreshing: store.is_refreshing(),
    }
}
