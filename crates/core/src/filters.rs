use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::model::{ListFilters, Priority, Task, TaskFilter};

/// Days after today still counted as "due soon" (inclusive).
pub const DUE_SOON_DAYS: i64 = 7;

/// One independent condition on a task. Active predicates are combined with AND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Lowercased needle matched against title or description.
    Search(String),
    Completed,
    Pending,
    DueSoon { today: NaiveDate },
    HighPriority,
    Priority(Priority),
    Tag(String),
}

impl Predicate {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Predicate::Search(needle) => {
                task.title.to_lowercase().contains(needle)
                    || task
                        .description
                        .as_ref()
                        .map(|description| description.to_lowercase().contains(needle))
                        .unwrap_or(false)
            }
            Predicate::Completed => task.completed,
            Predicate::Pending => !task.completed,
            Predicate::DueSoon { today } => {
                !task.completed
                    && task
                        .due_date
                        .map(|due| is_within_due_soon(due, *today))
                        .unwrap_or(false)
            }
            Predicate::HighPriority => task.priority == Priority::High && !task.completed,
            Predicate::Priority(priority) => task.priority == *priority,
            Predicate::Tag(tag) => task.tags.iter().any(|candidate| candidate == tag),
        }
    }
}

fn is_within_due_soon(due: NaiveDate, today: NaiveDate) -> bool {
    due >= today && due <= today + Duration::days(DUE_SOON_DAYS)
}

/// Translate the user's selections into the set of predicates that must all hold.
pub fn active_predicates(filters: &ListFilters, today: NaiveDate) -> Vec<Predicate> {
    let mut predicates = Vec::new();

    let needle = filters.search.trim().to_lowercase();
    if !needle.is_empty() {
        predicates.push(Predicate::Search(needle));
    }

    match filters.filter {
        TaskFilter::All => {}
        TaskFilter::Completed => predicates.push(Predicate::Completed),
        TaskFilter::Pending => predicates.push(Predicate::Pending),
        TaskFilter::DueSoon => predicates.push(Predicate::DueSoon { today }),
        TaskFilter::HighPriority => predicates.push(Predicate::HighPriority),
        TaskFilter::Priority(priority) => predicates.push(Predicate::Priority(priority)),
    }

    if let Some(tag) = filters.tag.as_ref().filter(|tag| !tag.is_empty()) {
        predicates.push(Predicate::Tag(tag.clone()));
    }

    if !filters.show_completed {
        predicates.push(Predicate::Pending);
    }

    predicates
}

pub fn matches_all(task: &Task, predicates: &[Predicate]) -> bool {
    predicates.iter().all(|predicate| predicate.matches(task))
}

/// Copy out the tasks that satisfy every predicate, preserving input order.
pub fn apply(tasks: &[Task], predicates: &[Predicate]) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| matches_all(task, predicates))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    None,
    Overdue,
    DueToday,
    DueSoon,
    Later,
    /// Due date has passed but the task is already done.
    Past,
}

/// Calendar-day classification used by list badges.
pub fn classify_due(task: &Task, today: NaiveDate) -> DueStatus {
    let Some(due) = task.due_date else {
        return DueStatus::None;
    };
    if due < today {
        if task.completed {
            DueStatus::Past
        } else {
            DueStatus::Overdue
        }
    } else if due == today {
        DueStatus::DueToday
    } else if is_within_due_soon(due, today) {
        DueStatus::DueSoon
    } else {
        DueStatus::Later
    }
}

/// Every distinct tag across the collection, sorted, for the tag picker.
pub fn tag_facets(tasks: &[Task]) -> Vec<String> {
    let tags: BTreeSet<&String> = tasks.iter().flat_map(|task| task.tags.iter()).collect();
    tags.into_iter().cloned().collect()
}
