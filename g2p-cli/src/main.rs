//! g2p CLI
//!
//! Runs go-to-production verification pipelines and reports their progress
//! live in the terminal.

mod commands;
mod logging;
mod reporter;

use clap::Parser;
use colored::*;
use commands::{Commands, handle_command};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "g2p")]
#[command(about = "Go-to-production verification pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match handle_command(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(commands::EXIT_FATAL)
        }
    }
}
