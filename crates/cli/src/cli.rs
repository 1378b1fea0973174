use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{value_parser, ArgAction, Args, Parser, Subcommand};

use crate::core::{ListFilters, NewTask, Priority, SortKey, TaskFilter, TaskPatch};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Filter, sort and edit tasks held by a remote task API.",
    after_help = "Examples:\n  taskdeck --demo list --filter pending --sort priority\n  taskdeck list --search milk\n  taskdeck toggle 42\n  taskdeck subtask add 42 Call the landlord\n  taskdeck token issue --id u1 --email ada@example.com --name Ada"
)]
pub struct Cli {
    /// Task API base URL (falls back to TASKDECK_API_URL or NEXT_PUBLIC_API_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token attached to every Task API request (falls back to TASKDECK_TOKEN)
    #[arg(long, value_name = "TOKEN", global = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long = "timeout", value_name = "SECONDS", global = true, value_parser = value_parser!(u64).range(1..))]
    pub timeout_secs: Option<u64>,

    /// Read configuration from this file instead of ./.env
    #[arg(long, value_name = "PATH", global = true)]
    pub env_file: Option<PathBuf>,

    /// Tracing filter directive (e.g. "info", "taskdeck_core=debug")
    #[arg(long = "log", value_name = "DIRECTIVE", global = true, default_value = "warn")]
    pub log_filter: String,

    /// Work against built-in sample tasks held in memory
    #[arg(long, global = true)]
    pub demo: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Show the filtered and sorted task list (default command)
    List(ListArgs),
    /// Show one task with its subtasks
    Show(IdArg),
    /// Create a task
    Add(AddArgs),
    /// Flip a task between pending and completed
    Toggle(IdArg),
    /// Change fields of a task
    Edit(EditArgs),
    /// Delete one or more tasks, one after another
    Delete(DeleteArgs),
    /// Manage the subtasks of a task
    #[command(subcommand)]
    Subtask(SubtaskCommand),
    /// Complete every pending task in the filtered list
    CompleteAll(ListArgs),
    /// Delete every completed task in the filtered list
    ClearCompleted(ListArgs),
    /// Apply one action to a selection of tasks
    #[command(subcommand)]
    Bulk(BulkCommand),
    /// Issue or verify bearer tokens
    #[command(subcommand)]
    Token(TokenCommand),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Case-insensitive text matched against title and description
    #[arg(long, short = 's', value_name = "TEXT")]
    pub search: Option<String>,

    /// all, completed, pending, due-soon, high-priority, or a priority (none|low|medium|high)
    #[arg(long, short = 'f', value_name = "FILTER")]
    pub filter: Option<TaskFilter>,

    /// Only tasks carrying this exact tag
    #[arg(long, short = 't', value_name = "TAG")]
    pub tag: Option<String>,

    /// Sort key
    #[arg(long, value_enum)]
    pub sort: Option<SortKey>,

    /// Leave completed tasks out of the list
    #[arg(long)]
    pub hide_completed: bool,
}

impl ListArgs {
    pub fn to_filters(&self) -> ListFilters {
        let defaults = ListFilters::default();
        ListFilters {
            search: self.search.clone().unwrap_or_default(),
            filter: self.filter.unwrap_or(defaults.filter),
            tag: self.tag.clone(),
            sort: self.sort.unwrap_or(defaults.sort),
            show_completed: !self.hide_completed,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct IdArg {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title
    #[arg(value_name = "TITLE", required = true)]
    pub title: Vec<String>,

    /// Longer description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'p', value_enum, default_value_t = Priority::None)]
    pub priority: Priority,

    /// Due date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub due: Option<NaiveDate>,

    /// Tags (comma-separated or repeated flag)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Vec<String>,

    /// Project or list name
    #[arg(long)]
    pub project: Option<String>,
}

impl From<AddArgs> for NewTask {
    fn from(args: AddArgs) -> Self {
        NewTask {
            title: args.title.join(" "),
            description: args.description,
            priority: args.priority,
            due_date: args.due,
            tags: args.tag,
            project: args.project,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    /// New description; pass an empty string to remove it
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'p', value_enum)]
    pub priority: Option<Priority>,

    /// New due date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", conflicts_with = "clear_due")]
    pub due: Option<NaiveDate>,

    /// Remove the due date
    #[arg(long)]
    pub clear_due: bool,

    /// Replace the tags (comma-separated or repeated flag)
    #[arg(long, value_delimiter = ',', action = ArgAction::Append)]
    pub tag: Option<Vec<String>>,

    #[arg(long, conflicts_with = "clear_project")]
    pub project: Option<String>,

    /// Remove the project
    #[arg(long)]
    pub clear_project: bool,
}

impl EditArgs {
    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            completed: None,
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            tags: self.tag.clone(),
            due_date: if self.clear_due {
                Some(None)
            } else {
                self.due.map(Some)
            },
            subtasks: None,
            project: if self.clear_project {
                Some(None)
            } else {
                self.project.clone().map(Some)
            },
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// One or more task ids to delete
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubtaskCommand {
    /// Append a subtask
    Add {
        task_id: String,
        #[arg(value_name = "TITLE", required = true)]
        title: Vec<String>,
    },
    /// Flip a subtask between pending and completed
    Toggle { task_id: String, subtask_id: String },
    /// Rename a subtask
    Edit {
        task_id: String,
        subtask_id: String,
        #[arg(value_name = "TITLE", required = true)]
        title: Vec<String>,
    },
    /// Remove a subtask
    Delete { task_id: String, subtask_id: String },
    /// Mark every subtask of a task completed
    CompleteAll { task_id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum BulkCommand {
    /// Complete the given tasks
    Complete(DeleteArgs),
    /// Delete the given tasks
    Delete(DeleteArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum TokenCommand {
    /// Sign a bearer token for a user (needs TASKDECK_JWT_SECRET)
    Issue {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Check a bearer token's signature, expiry, issuer and audience
    Verify {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_list_filters() {
        let cli = Cli::parse_from([
            "taskdeck",
            "list",
            "--filter",
            "pending",
            "--sort",
            "priority",
            "--hide-completed",
        ]);
        let Some(CliCommand::List(args)) = cli.command else {
            panic!("expected list command");
        };
        let filters = args.to_filters();
        assert_eq!(filters.filter, TaskFilter::Pending);
        assert_eq!(filters.sort, SortKey::Priority);
        assert!(!filters.show_completed);
    }

    #[test]
    fn edit_args_build_a_patch() {
        let cli = Cli::parse_from(["taskdeck", "edit", "7", "--clear-due", "--tag", "a,b"]);
        let Some(CliCommand::Edit(args)) = cli.command else {
            panic!("expected edit command");
        };
        let patch = args.to_patch();
        assert_eq!(patch.due_date, Some(None));
        assert_eq!(patch.tags, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(patch.title, None);
    }
}
