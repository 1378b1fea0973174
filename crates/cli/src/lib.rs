pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod render;

use std::io::Write;

use anyhow::{anyhow, Context, Result};

pub use taskdeck_auth as auth;
pub use taskdeck_core as core;

use crate::cli::{Cli, CliCommand, ListArgs};
use crate::core::store::Action;
use crate::core::{
    derive, Clock, HttpTaskApi, InMemoryTaskApi, SystemClock, TaskApi, TaskSession, TaskStore,
};

/// Run one parsed command, writing its output to stdout.
pub fn run(cli: Cli) -> Result<()> {
    logging::init_tracing(&cli.log_filter)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run_async(cli))
}

async fn run_async(cli: Cli) -> Result<()> {
    let command = cli
        .command
        .clone()
        .unwrap_or_else(|| CliCommand::List(ListArgs::default()));
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    if let CliCommand::Token(token_command) = command {
        let config = auth::AuthConfig::from_env()?;
        return commands::execute_token(&config, token_command, &mut handle);
    }

    if cli.demo {
        let api = InMemoryTaskApi::with_sample_tasks(SystemClock.today());
        return drive(TaskSession::new(api), command, &mut handle).await;
    }

    let api = config::from_cli(&cli).and_then(|config| HttpTaskApi::new(&config));
    match api {
        Ok(api) => drive(TaskSession::new(api), command, &mut handle).await,
        Err(error) => {
            // Nothing is fetched when the base URL is unusable.
            tracing::error!(error = %error, "task API is not configured");
            let mut store = TaskStore::new();
            store.apply(Action::Misconfigured(error.clone()));
            render::write_view(&derive(&store, SystemClock.today()), &mut handle)?;
            Err(anyhow!(error))
        }
    }
}

async fn drive<A: TaskApi, W: Write>(
    session: TaskSession<A>,
    command: CliCommand,
    writer: W,
) -> Result<()> {
    commands::execute(&session, command, writer).await
}
