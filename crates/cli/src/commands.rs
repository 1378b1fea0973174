use std::fmt;
use std::io::Write;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;

use crate::auth::{AuthConfig, TokenIssuer, User};
use crate::cli::{BulkCommand, CliCommand, DeleteArgs, SubtaskCommand, TokenCommand};
use crate::core::{BulkReport, MutationOutcome, TaskApi, TaskError, TaskSession};
use crate::render;

/// Load the list, run one command through the session, then print the resulting list.
pub async fn execute<A: TaskApi, W: Write>(
    session: &TaskSession<A>,
    command: CliCommand,
    mut writer: W,
) -> Result<()> {
    if let CliCommand::List(args) | CliCommand::CompleteAll(args) | CliCommand::ClearCompleted(args) =
        &command
    {
        let filters = args.to_filters();
        session.set_search(filters.search);
        session.set_filter(filters.filter);
        session.set_tag(filters.tag);
        session.set_sort(filters.sort);
        session.set_show_completed(filters.show_completed);
    }

    if let Err(err) = session.load().await {
        render::write_view(&session.view(), &mut writer)?;
        return Err(anyhow!(err).context("could not load tasks"));
    }

    let outcome = match command {
        CliCommand::List(_) => None,
        CliCommand::Show(arg) => {
            session.select(Some(arg.id.as_str()))?;
            let task = session
                .task(&arg.id)
                .ok_or_else(|| TaskError::not_found(&arg.id))?;
            render::write_task(&task, &mut writer)?;
            return Ok(());
        }
        CliCommand::Add(args) => Some(session.create_task(args.into()).await?),
        CliCommand::Toggle(arg) => Some(session.toggle_complete(&arg.id).await?),
        CliCommand::Edit(args) => Some(session.edit_task(&args.id, args.to_patch()).await?),
        CliCommand::Delete(args) => {
            let summary = delete_each(session, &args).await;
            summary.write_to(&mut writer)?;
            render::write_view(&session.view(), &mut writer)?;
            return summary.into_result();
        }
        CliCommand::Subtask(command) => Some(execute_subtask(session, command).await?),
        CliCommand::CompleteAll(_) => {
            let report = session.complete_all().await;
            return finish_bulk(session, BulkVerb::Completed, report, &mut writer);
        }
        CliCommand::ClearCompleted(_) => {
            let report = session.clear_completed().await;
            return finish_bulk(session, BulkVerb::Deleted, report, &mut writer);
        }
        CliCommand::Bulk(BulkCommand::Complete(args)) => {
            select_bulk(session, &args.ids)?;
            let report = session.bulk_complete().await;
            return finish_bulk(session, BulkVerb::Completed, report, &mut writer);
        }
        CliCommand::Bulk(BulkCommand::Delete(args)) => {
            select_bulk(session, &args.ids)?;
            let report = session.bulk_delete().await;
            return finish_bulk(session, BulkVerb::Deleted, report, &mut writer);
        }
        CliCommand::Token(_) => bail!("token commands do not talk to the task API"),
    };

    render::write_view(&session.view(), &mut writer)?;
    match outcome {
        Some(MutationOutcome::RolledBack(error)) => {
            Err(anyhow!(error).context("change was not saved; list shows the server state"))
        }
        _ => Ok(()),
    }
}

async fn execute_subtask<A: TaskApi>(
    session: &TaskSession<A>,
    command: SubtaskCommand,
) -> Result<MutationOutcome, TaskError> {
    match command {
        SubtaskCommand::Add { task_id, title } => {
            session.add_subtask(&task_id, &title.join(" ")).await
        }
        SubtaskCommand::Toggle {
            task_id,
            subtask_id,
        } => session.toggle_subtask(&task_id, &subtask_id).await,
        SubtaskCommand::Edit {
            task_id,
            subtask_id,
            title,
        } => {
            session
                .edit_subtask(&task_id, &subtask_id, &title.join(" "))
                .await
        }
        SubtaskCommand::Delete {
            task_id,
            subtask_id,
        } => session.delete_subtask(&task_id, &subtask_id).await,
        SubtaskCommand::CompleteAll { task_id } => session.complete_subtasks(&task_id).await,
    }
}

fn select_bulk<A: TaskApi>(session: &TaskSession<A>, ids: &[String]) -> Result<()> {
    session.clear_bulk();
    for id in ids {
        session
            .toggle_bulk(id)
            .with_context(|| format!("cannot select task {id}"))?;
    }
    Ok(())
}

async fn delete_each<A: TaskApi>(session: &TaskSession<A>, args: &DeleteArgs) -> DeleteSummary {
    let mut summary = DeleteSummary::default();
    for id in &args.ids {
        match session.delete_task(id).await {
            Ok(MutationOutcome::Confirmed) => summary.deleted += 1,
            Ok(MutationOutcome::RolledBack(error)) => summary.failed.push((id.clone(), error)),
            Err(TaskError::TaskNotFound { .. }) => summary.missing.push(id.clone()),
            Err(error) => summary.failed.push((id.clone(), error)),
        }
    }
    summary
}

fn finish_bulk<A: TaskApi, W: Write>(
    session: &TaskSession<A>,
    verb: BulkVerb,
    report: BulkReport,
    mut writer: W,
) -> Result<()> {
    writeln!(writer, "{}", SummaryLine::new(verb, report.confirmed))?;
    for (id, error) in &report.rolled_back {
        writeln!(writer, "Failed {id}: {error}")?;
    }
    render::write_view(&session.view(), &mut writer)?;
    if report.rolled_back.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {} tasks were not changed",
            report.rolled_back.len(),
            report.attempted()
        ))
    }
}

#[derive(Default)]
struct DeleteSummary {
    deleted: usize,
    missing: Vec<String>,
    failed: Vec<(String, TaskError)>,
}

impl DeleteSummary {
    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::new(BulkVerb::Deleted, self.deleted))?;
        if !self.missing.is_empty() {
            writeln!(writer, "Not found: {}", self.missing.join(", "))?;
        }
        for (id, error) in &self.failed {
            writeln!(writer, "Failed {id}: {error}")?;
        }
        Ok(())
    }

    fn into_result(self) -> Result<()> {
        match self.failed.len() {
            0 => Ok(()),
            count => Err(anyhow!("{count} delete(s) failed")),
        }
    }
}

#[derive(Clone, Copy)]
enum BulkVerb {
    Completed,
    Deleted,
}

enum SummaryLine {
    Changed(BulkVerb, usize),
    Unchanged(BulkVerb),
}

impl SummaryLine {
    fn new(verb: BulkVerb, count: usize) -> Self {
        if count > 0 {
            SummaryLine::Changed(verb, count)
        } else {
            SummaryLine::Unchanged(verb)
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Changed(verb, count) => write!(
                f,
                "{} {} task{}",
                match verb {
                    BulkVerb::Completed => "Completed",
                    BulkVerb::Deleted => "Deleted",
                },
                count,
                if *count == 1 { "" } else { "s" }
            ),
            SummaryLine::Unchanged(BulkVerb::Completed) => write!(f, "No tasks completed"),
            SummaryLine::Unchanged(BulkVerb::Deleted) => write!(f, "No tasks deleted"),
        }
    }
}

/// Token commands need only the auth configuration.
pub fn execute_token<W: Write>(
    config: &AuthConfig,
    command: TokenCommand,
    mut writer: W,
) -> Result<()> {
    let issuer = TokenIssuer::new(config.clone());
    match command {
        TokenCommand::Issue { id, email, name } => {
            let token = issuer.issue(&User { id, email, name }, Utc::now())?;
            writeln!(writer, "{token}")?;
        }
        TokenCommand::Verify { token } => {
            let claims = issuer.verify(&token)?;
            writeln!(writer, "Token is valid")?;
            writeln!(writer, "  id: {}", claims.id)?;
            writeln!(writer, "  email: {}", claims.email)?;
            writeln!(writer, "  name: {}", claims.name)?;
            writeln!(writer, "  expires: {}", claims.exp)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{IdArg, ListArgs};
    use crate::core::services::memory::{InMemoryTaskApi, Operation};
    use crate::core::{FixedClock, SortKey, TaskFilter};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session() -> TaskSession<InMemoryTaskApi> {
        TaskSession::with_clock(
            InMemoryTaskApi::with_records(vec![
                json!({ "id": "1", "title": "Pay rent", "priority": 3, "completed": false, "dueDate": "2024-01-01" }),
                json!({ "id": "2", "title": "Buy milk", "priority": 0, "completed": true, "dueDate": null }),
            ]),
            FixedClock(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
        )
    }

    async fn run(session: &TaskSession<InMemoryTaskApi>, command: CliCommand) -> (Result<()>, String) {
        let mut output = Vec::new();
        let result = execute(session, command, &mut output).await;
        (result, String::from_utf8(output).expect("utf8"))
    }

    #[tokio::test]
    async fn list_applies_filters_and_sort() {
        let session = session();
        let args = ListArgs {
            filter: Some(TaskFilter::Pending),
            sort: Some(SortKey::Priority),
            ..ListArgs::default()
        };
        let (result, output) = run(&session, CliCommand::List(args)).await;

        assert!(result.is_ok());
        assert!(output.contains("Pay rent"));
        assert!(!output.contains("Buy milk"));
    }

    #[tokio::test]
    async fn failed_toggle_reports_and_shows_server_state() {
        let session = session();
        session
            .api()
            .fail_next(Operation::Update, TaskError::api("PUT /tasks/1", 500, ""));
        let (result, output) = run(
            &session,
            CliCommand::Toggle(IdArg { id: "1".into() }),
        )
        .await;

        assert!(result.is_err());
        assert!(output.contains("Warning: Could not toggle completion"));
        assert!(output.contains("[ ]    1  Pay rent"));
    }

    #[tokio::test]
    async fn delete_reports_deleted_and_missing() {
        let session = session();
        let (result, output) = run(
            &session,
            CliCommand::Delete(DeleteArgs {
                ids: vec!["2".into(), "missing".into()],
            }),
        )
        .await;

        assert!(result.is_ok());
        assert!(output.contains("Deleted 1 task"));
        assert!(output.contains("Not found: missing"));
    }

    #[tokio::test]
    async fn load_failure_prints_error_panel() {
        let session = session();
        session
            .api()
            .fail_next(Operation::List, TaskError::network("http://api.test", "refused"));
        let (result, output) = run(&session, CliCommand::List(ListArgs::default())).await;

        assert!(result.is_err());
        assert!(output.contains("Error: Cannot connect to task API at http://api.test"));
    }

    #[tokio::test]
    async fn clear_completed_deletes_done_tasks() {
        let session = session();
        let (result, output) = run(&session, CliCommand::ClearCompleted(ListArgs::default())).await;

        assert!(result.is_ok());
        assert!(output.contains("Deleted 1 task"));
        assert_eq!(session.api().records().len(), 1);
    }

    #[test]
    fn token_issue_then_verify() {
        let config = AuthConfig::new("0123456789abcdef0123", "http://localhost:3000").unwrap();
        let mut issued = Vec::new();
        execute_token(
            &config,
            TokenCommand::Issue {
                id: "u1".into(),
                email: "ada@example.com".into(),
                name: "Ada".into(),
            },
            &mut issued,
        )
        .unwrap();
        let token = String::from_utf8(issued).unwrap().trim().to_string();

        let mut verified = Vec::new();
        execute_token(&config, TokenCommand::Verify { token }, &mut verified).unwrap();
        let verified = String::from_utf8(verified).unwrap();
        assert!(verified.contains("email: ada@example.com"));
    }
}
