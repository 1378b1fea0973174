//! Plain-text rendering of the view model.

use std::io::{self, Write};

use crate::core::filters::DueStatus;
use crate::core::{ListPanel, NoticeKind, Priority, Task, TaskRow, ViewModel};

pub fn write_view<W: Write>(view: &ViewModel, mut writer: W) -> io::Result<()> {
    if let Some(notice) = &view.notice {
        let prefix = match notice.kind {
            NoticeKind::Info => "Note",
            NoticeKind::Error => "Warning",
        };
        writeln!(writer, "{prefix}: {}", notice.message)?;
    }

    match &view.panel {
        ListPanel::Idle => writeln!(writer, "Tasks not loaded yet")?,
        ListPanel::Loading => writeln!(writer, "Loading tasks…")?,
        ListPanel::Error { message, retryable } => {
            writeln!(writer, "Error: {message}")?;
            if *retryable {
                writeln!(writer, "Run the command again to retry.")?;
            }
        }
        ListPanel::Ready(rows) => {
            if rows.is_empty() {
                writeln!(writer, "No tasks match the current filters")?;
            }
            for row in rows {
                write_row(row, &mut writer)?;
            }
            let stats = &view.stats;
            writeln!(
                writer,
                "{}/{} done ({}%), {} pending, {} due today",
                stats.completed,
                stats.total,
                stats.completion_percent,
                stats.pending,
                stats.due_today
            )?;
            if !view.tags.is_empty() {
                writeln!(writer, "Tags: {}", view.tags.join(", "))?;
            }
        }
    }
    Ok(())
}

fn write_row<W: Write>(row: &TaskRow, mut writer: W) -> io::Result<()> {
    let task = &row.task;
    let mut line = format!(
        "{}{} {:>4}  {}",
        if row.bulk_selected { "*" } else { " " },
        checkbox(task.completed),
        task.id,
        task.title
    );
    if task.priority != Priority::None {
        line.push_str(&format!("  !{}", task.priority.as_str()));
    }
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {due}"));
        if let Some(badge) = due_badge(row.due) {
            line.push_str(&format!(" ({badge})"));
        }
    }
    for tag in &task.tags {
        line.push_str(&format!("  #{tag}"));
    }
    if row.subtasks.total > 0 {
        line.push_str(&format!(
            "  [{}/{} subtasks]",
            row.subtasks.completed, row.subtasks.total
        ));
    }
    writeln!(writer, "{line}")
}

pub fn write_task<W: Write>(task: &Task, mut writer: W) -> io::Result<()> {
    writeln!(writer, "{} {}  {}", checkbox(task.completed), task.id, task.title)?;
    if let Some(description) = &task.description {
        writeln!(writer, "  {description}")?;
    }
    writeln!(writer, "  Priority: {}", task.priority.label())?;
    match task.due_date {
        Some(due) => writeln!(writer, "  Due: {due}")?,
        None => writeln!(writer, "  Due: -")?,
    }
    if let Some(project) = &task.project {
        writeln!(writer, "  Project: {project}")?;
    }
    if !task.tags.is_empty() {
        writeln!(writer, "  Tags: {}", task.tags.join(", "))?;
    }
    if !task.subtasks.is_empty() {
        let progress = task.subtask_progress();
        writeln!(
            writer,
            "  Subtasks ({}/{}, {}%):",
            progress.completed, progress.total, progress.percent
        )?;
        for subtask in &task.subtasks {
            writeln!(
                writer,
                "    {} {}  {}",
                checkbox(subtask.completed),
                subtask.id,
                subtask.title
            )?;
        }
    }
    Ok(())
}

fn checkbox(completed: bool) -> &'static str {
    if completed {
        "[x]"
    } else {
        "[ ]"
    }
}

fn due_badge(status: DueStatus) -> Option<&'static str> {
    match status {
        DueStatus::Overdue => Some("overdue"),
        DueStatus::DueToday => Some("today"),
        DueStatus::DueSoon => Some("soon"),
        DueStatus::Past => Some("past"),
        DueStatus::Later | DueStatus::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{Action, FetchPurpose};
    use crate::core::{derive, TaskError, TaskStore};
    use chrono::NaiveDate;

    fn render(view: &ViewModel) -> String {
        let mut out = Vec::new();
        write_view(view, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn error_panel_replaces_the_list() {
        let mut store = TaskStore::new();
        store.apply(Action::Misconfigured(TaskError::configuration("no url")));
        let output = render(&derive(&store, today()));

        assert!(output.contains("Error: Configuration error: no url"));
        assert!(!output.contains("retry"));
    }

    #[test]
    fn rows_show_priority_due_and_tags() {
        let mut store = TaskStore::new();
        let seq = store.begin_fetch(FetchPurpose::Load);
        store.apply(Action::FetchSucceeded {
            seq,
            tasks: vec![Task {
                id: "1".into(),
                title: "Pay rent".into(),
                description: None,
                completed: false,
                priority: Priority::High,
                due_date: Some(today()),
                tags: vec!["home".into()],
                subtasks: Vec::new(),
                project: None,
            }],
            rejected: 0,
        });
        let output = render(&derive(&store, today()));

        assert!(output.contains("[ ]    1  Pay rent  !high  due 2024-01-01 (today)  #home"));
        assert!(output.contains("0/1 done (0%), 1 pending, 1 due today"));
    }
}
