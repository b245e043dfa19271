use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Environment variable carrying one or more comma-separated config paths.
pub const CONFIG_ENV: &str = "INVENTORY_EXTENSION_CONFIG";

#[derive(Parser)]
#[command(name = "odg-worker")]
#[command(about = "Reports orphan cloud resources from the inventory to Open Delivery Gear")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Worker management
    #[command(subcommand)]
    Worker(WorkerCommands),
    /// Task inspection and one-shot execution
    #[command(subcommand)]
    Task(TaskCommands),
}

#[derive(Subcommand)]
pub enum WorkerCommands {
    /// Start the worker and run the configured jobs
    Start(ConfigArgs),
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List the registered tasks
    List,
    /// Run a single task once and print its report
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to a config file; may be repeated, later files win
    #[arg(
        short,
        long = "config",
        env = CONFIG_ENV,
        value_delimiter = ',',
        num_args = 1..,
        required = true
    )]
    pub config: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Task name, e.g. odg:task:report-orphan-vms-aws
    #[arg(short, long)]
    pub task: String,

    /// YAML or JSON file holding the task payload
    #[arg(short, long)]
    pub payload: PathBuf,
}
