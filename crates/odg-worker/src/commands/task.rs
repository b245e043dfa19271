use std::future::Future;

use anyhow::{Context, Result, bail};

use odg_tasks::{DynTaskHandler, Payload, ReconcileError, RunReport, builtin_task_names};
use odg_worker::bootstrap::{build_client, build_registry};
use odg_worker::db::create_pool;
use odg_worker::metrics_server::init_metrics;
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;

pub fn list() {
    for name in builtin_task_names() {
        println!("{name}");
    }
}

/// Runs one task once and prints the run report as JSON.
pub async fn run(args: &RunArgs) -> Result<()> {
    let config = super::load(&args.config)?;

    let raw = std::fs::read(&args.payload)
        .with_context(|| format!("failed to read payload {}", args.payload.display()))?;
    let payload = Payload::decode(&raw).context("invalid payload")?;

    init_metrics();
    let pool = create_pool(&config.database).context("failed to create database pool")?;
    let client = build_client(&config.odg).context("failed to create api client")?;
    client
        .authenticate()
        .await
        .context("failed to authenticate against the api")?;

    let registry = build_registry(pool.clone(), client.clone())?;
    let handler = registry.get(&args.task)?;

    let cancel = CancellationToken::new();
    let outcome = run_until_interrupted(&handler, &payload, &cancel, tokio::signal::ctrl_c()).await;

    if let Err(e) = client.logout().await {
        tracing::warn!(error = %e, "logout failed");
    }
    pool.close().await;

    match outcome {
        RunOutcome::Finished(Ok(report)) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        RunOutcome::Finished(Err(e)) => {
            tracing::error!(task = %args.task, retry = %e.retry(), error = %e, "task failed");
            Err(e).with_context(|| format!("task {} failed", args.task))
        }
        RunOutcome::Interrupted => bail!("task {} interrupted", args.task),
    }
}

#[derive(Debug)]
enum RunOutcome {
    Finished(Result<RunReport, ReconcileError>),
    Interrupted,
}

/// Runs `handler` until it finishes or `interrupt` resolves. An interrupt
/// cancels the run and is reported instead of the run's own result.
async fn run_until_interrupted<F: Future>(
    handler: &DynTaskHandler,
    payload: &Payload,
    cancel: &CancellationToken,
    interrupt: F,
) -> RunOutcome {
    tokio::select! {
        result = handler.handle(payload, cancel) => RunOutcome::Finished(result),
        _ = interrupt => {
            cancel.cancel();
            RunOutcome::Interrupted
        }
    }
}
