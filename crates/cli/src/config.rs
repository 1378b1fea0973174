pub use taskdeck_core::config::*;

use taskdeck_core::TaskError;

use crate::cli::Cli;

pub fn from_cli(cli: &Cli) -> Result<AppConfig, TaskError> {
    AppConfig::discover(ConfigOverrides {
        api_url: cli.api_url.clone(),
        token: cli.token.clone(),
        timeout_secs: cli.timeout_secs,
        env_file: cli.env_file.clone(),
    })
}
