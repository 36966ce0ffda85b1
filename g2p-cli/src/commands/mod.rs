//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod check;

pub use check::CheckArgs;

use anyhow::Result;
use clap::Subcommand;
use std::process::ExitCode;

pub use check::EXIT_FATAL;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline: deploy, check and tear down every state in order
    Check(CheckArgs),
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module and returns the
/// process exit code.
pub async fn handle_command(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Check(args) => check::handle_check(args).await,
    }
}
