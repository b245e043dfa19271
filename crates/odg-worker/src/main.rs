mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, TaskCommands, WorkerCommands};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Worker(WorkerCommands::Start(args)) => commands::worker::start(args).await?,
        Commands::Task(TaskCommands::List) => commands::task::list(),
        Commands::Task(TaskCommands::Run(args)) => commands::task::run(args).await?,
    }

    Ok(())
}
