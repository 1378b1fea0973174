pub use taskdeck_cli::cli;
pub use taskdeck_cli::commands;
pub use taskdeck_cli::config;
pub use taskdeck_cli::render;
pub use taskdeck_cli::run;

pub use taskdeck_auth as auth;
pub use taskdeck_core as core;
pub use taskdeck_core::model;
pub use taskdeck_core::AppConfig;
