use anyhow::{Context, Result};
use odg_worker::bootstrap::{build_client, build_registry};
use odg_worker::db::{create_pool, test_connection};
use odg_worker::metrics_server::{init_metrics, serve};
use odg_worker::{RetryPolicy, Scheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::ConfigArgs;

pub async fn start(args: &ConfigArgs) -> Result<()> {
    let config = super::load(args)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting worker");

    let cancel = CancellationToken::new();

    let mut metrics_task = None;
    if config.metrics.enabled {
        let addr = config.metrics.socket_addr()?;
        if let Some(handle) = init_metrics() {
            let cancel = cancel.clone();
            metrics_task = Some(tokio::spawn(async move {
                if let Err(e) = serve(addr, handle, cancel).await {
                    error!(error = %e, %addr, "metrics server failed");
                }
            }));
        }
    }

    let pool = create_pool(&config.database).context("failed to create database pool")?;
    if let Err(e) = test_connection(&pool).await {
        warn!(error = %e, "inventory database not reachable yet");
    }

    let client = build_client(&config.odg).context("failed to create api client")?;
    client
        .authenticate()
        .await
        .context("failed to authenticate against the api")?;
    info!(endpoint = client.endpoint(), "api client ready");

    let registry = build_registry(pool.clone(), client.clone())?;
    let policy = RetryPolicy::from(&config.worker);
    let scheduler = Scheduler::from_config(&registry, &config.jobs, policy)?;
    if scheduler.jobs().is_empty() {
        warn!("no jobs configured");
    }

    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));

    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    cancel.cancel();

    if let Err(e) = scheduler_task.await {
        error!(error = %e, "scheduler task panicked");
    }
    if let Some(task) = metrics_task {
        let _ = task.await;
    }

    if let Err(e) = client.logout().await {
        warn!(error = %e, "logout failed");
    }
    pool.close().await;
    info!("worker stopped");
    Ok(())
}
