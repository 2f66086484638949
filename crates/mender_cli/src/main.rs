//! BugMender CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success (including runs that finished without solving the bug)
//! - 1: Any uncaught error or user interrupt

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive("mender=info".parse().unwrap())
                .add_directive("warn".parse().unwrap()),
        )
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let cli = Cli::parse();

    let settings = match commands::load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let result = match cli.command {
        Commands::Solve(args) => commands::solve::execute(args, settings).await,
        Commands::Status(args) => commands::status::execute(args, settings).await,
        Commands::Server(args) => commands::server::execute(args, settings).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
